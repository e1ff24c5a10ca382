// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright MCGW Contributors 2024.

//! Wall-clock time on top of the monotonic counter.
//!
//! Real time = hardware counter + persisted offset. Setting the clock never
//! touches the counter: it stores the difference between the requested time
//! and the live counter value as the new offset.
//!
//! The conversion pair is asymmetric on purpose: counter→ms truncates and
//! ms→counter rounds up, so `counter_to_ms(ms_to_counter(x)) == x` and a
//! freshly set clock reads back exactly.
//!
//! The largest convertible timestamp is `(i64::MAX - 999) / 32768` counter
//! units, roughly 8900 years; anything beyond is an [`ErrorCode::OutOfRange`].

use kernel::ErrorCode;

/// Counter frequency in Hz.
pub const COUNTER_FREQUENCY_HZ: i64 = 32768;

/// A wall-clock instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timestamp {
    pub seconds: u64,
    pub milliseconds: u16,
}

/// Counter units to milliseconds, truncating towards zero (the millisecond
/// advances only once it has completely passed).
pub fn counter_to_ms(counter: i64) -> Result<i64, ErrorCode> {
    if counter < 0 || counter > i64::MAX / 1000 {
        return Err(ErrorCode::OutOfRange);
    }
    // Multiply first so nothing is lost to intermediate truncation.
    Ok(counter * 1000 / COUNTER_FREQUENCY_HZ)
}

/// Milliseconds to counter units, rounding up to stay consistent with
/// [`counter_to_ms`].
pub fn ms_to_counter(time_ms: i64) -> Result<i64, ErrorCode> {
    if time_ms < 0 || time_ms > (i64::MAX - 999) / COUNTER_FREQUENCY_HZ {
        return Err(ErrorCode::OutOfRange);
    }
    Ok((time_ms * COUNTER_FREQUENCY_HZ + 999) / 1000)
}

/// Current wall-clock time from a live counter value and the stored offset.
pub fn time_from_counter(counter: i64, offset: i64) -> Result<Timestamp, ErrorCode> {
    // The counter is non-negative by construction, so the sum can only
    // overflow upwards.
    if offset > i64::MAX - counter {
        return Err(ErrorCode::OutOfRange);
    }
    let time_ms = counter_to_ms(counter + offset)?;
    Ok(Timestamp {
        seconds: (time_ms / 1000) as u64,
        milliseconds: (time_ms % 1000) as u16,
    })
}

/// Offset that makes the clock read `target` given the live counter value.
pub fn offset_for_time(target: Timestamp, counter: i64) -> Result<i64, ErrorCode> {
    if target.seconds > (i64::MAX as u64 - target.milliseconds as u64) / 1000 {
        return Err(ErrorCode::OutOfRange);
    }
    let time_ms = (target.seconds * 1000) as i64 + target.milliseconds as i64;
    let target_counter = ms_to_counter(time_ms)?;
    // Both operands are non-negative i64, the difference cannot overflow.
    Ok(target_counter - counter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_is_exact() {
        // Spot checks across [0, 2^45] ms, including values that do not
        // divide evenly.
        let samples = [
            0i64,
            1,
            2,
            999,
            1000,
            32768,
            1 << 20,
            123_456_789,
            (1 << 45) - 1,
            1 << 45,
        ];
        for &ms in &samples {
            let counter = ms_to_counter(ms).unwrap();
            assert_eq!(counter_to_ms(counter).unwrap(), ms, "ms={}", ms);
        }
    }

    #[test]
    fn conversion_directions() {
        // 1 ms is 32.768 counter units; round up on the way in.
        assert_eq!(ms_to_counter(1).unwrap(), 33);
        // 33 units is 1.0071 ms; truncate on the way out.
        assert_eq!(counter_to_ms(33).unwrap(), 1);
        // 32 units has not completed the first millisecond yet.
        assert_eq!(counter_to_ms(32).unwrap(), 0);
    }

    #[test]
    fn conversion_bounds() {
        assert_eq!(counter_to_ms(-1), Err(ErrorCode::OutOfRange));
        assert_eq!(counter_to_ms(i64::MAX / 1000 + 1), Err(ErrorCode::OutOfRange));
        assert_eq!(ms_to_counter(-1), Err(ErrorCode::OutOfRange));
        assert_eq!(
            ms_to_counter((i64::MAX - 999) / COUNTER_FREQUENCY_HZ + 1),
            Err(ErrorCode::OutOfRange)
        );
        assert!(ms_to_counter((i64::MAX - 999) / COUNTER_FREQUENCY_HZ).is_ok());
    }

    #[test]
    fn clock_reads_back_after_set() {
        let live_counter = 5_000_000i64;
        let target = Timestamp {
            seconds: 1_700_000_000,
            milliseconds: 123,
        };
        let offset = offset_for_time(target, live_counter).unwrap();
        assert_eq!(time_from_counter(live_counter, offset).unwrap(), target);
    }

    #[test]
    fn negative_offset_before_epoch_is_rejected_on_read() {
        // Counter plus offset underflowing zero means the clock was set and
        // then the counter rolled back, which cannot happen; the conversion
        // reports range.
        assert_eq!(
            time_from_counter(100, -200),
            Err(ErrorCode::OutOfRange)
        );
    }

    #[test]
    fn read_overflow_detected() {
        assert_eq!(
            time_from_counter(i64::MAX, 1),
            Err(ErrorCode::OutOfRange)
        );
        assert_eq!(
            offset_for_time(
                Timestamp {
                    seconds: u64::MAX,
                    milliseconds: 0
                },
                0
            ),
            Err(ErrorCode::OutOfRange)
        );
    }
}
