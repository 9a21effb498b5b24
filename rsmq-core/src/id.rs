//! Message identifiers
//!
//! An identifier is 32 characters: a 10-character base-36 encoding of the
//! enqueue time in microseconds, followed by 22 random characters from
//! `[A-Za-z0-9]`. The prefix is zero-padded, so plain string comparison of two
//! identifiers orders them by enqueue time.

use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::time::StoreTime;

/// Total identifier length
pub const ID_LENGTH: usize = TIMESTAMP_WIDTH + RANDOM_SUFFIX_LENGTH;

/// Width of the time prefix. Ten base-36 digits cover timestamps up to 2084.
pub const TIMESTAMP_WIDTH: usize = 10;

/// Length of the random suffix (~130 bits)
pub const RANDOM_SUFFIX_LENGTH: usize = 22;

const BASE36_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate an identifier for a message enqueued at `now_ms`, with
/// `now_micros` (`0..1000`) breaking ties within the millisecond.
pub fn generate(now_ms: u64, now_micros: u32) -> String {
    generate_with(&mut rand::thread_rng(), now_ms, now_micros)
}

/// Generate an identifier from a store timestamp
pub fn generate_at(time: StoreTime) -> String {
    generate(time.as_unix_millis(), time.sub_millis_micros())
}

pub fn generate_with<R: Rng + ?Sized>(rng: &mut R, now_ms: u64, now_micros: u32) -> String {
    debug_assert!(now_micros < 1000);

    let mut id = encode_timestamp(now_ms * 1000 + u64::from(now_micros));
    id.extend(
        rng.sample_iter(&Alphanumeric)
            .take(RANDOM_SUFFIX_LENGTH)
            .map(char::from),
    );
    id
}

/// Encode microseconds since the epoch as zero-padded base 36
pub fn encode_timestamp(mut micros: u64) -> String {
    let mut digits = Vec::with_capacity(TIMESTAMP_WIDTH);
    while micros > 0 {
        digits.push(BASE36_ALPHABET[(micros % 36) as usize]);
        micros /= 36;
    }
    while digits.len() < TIMESTAMP_WIDTH {
        digits.push(b'0');
    }
    digits.iter().rev().map(|&b| char::from(b)).collect()
}

/// Decode a base-36 time prefix back to microseconds since the epoch
pub fn decode_timestamp(prefix: &str) -> Option<u64> {
    u64::from_str_radix(prefix, 36).ok()
}

/// Millisecond timestamp at which the message with this identifier was sent.
///
/// Sub-millisecond precision does not survive: the value is truncated.
pub fn sent_at(id: &str) -> Option<u64> {
    let prefix = id.get(..TIMESTAMP_WIDTH)?;
    decode_timestamp(prefix).map(|micros| micros / 1000)
}
