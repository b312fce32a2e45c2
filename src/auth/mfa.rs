/*!
 * # Multi-Factor Authentication (MFA) Module
 *
 * RFC 6238 TOTP (HMAC-SHA1) with base32 secrets, plus single-use backup
 * codes. Persistence of secrets lives in the auth service; this module is
 * pure computation.
 */

use hmac::{Hmac, Mac};
use rand::Rng;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MfaError {
    #[error("Invalid TOTP code")]
    InvalidTotpCode,

    #[error("MFA code already used")]
    CodeAlreadyUsed,

    #[error("MFA not enabled for this account")]
    MfaNotEnabled,

    #[error("MFA setup required")]
    SetupRequired,

    #[error("Invalid MFA secret")]
    InvalidSecret,
}

#[derive(Debug, Clone)]
pub struct TotpConfig {
    pub issuer: String,
    pub digits: u32,
    pub period: u64,
    /// Steps accepted either side of the current one
    pub window: i64,
    pub secret_bytes: usize,
    pub backup_code_count: usize,
}

impl Default for TotpConfig {
    fn default() -> Self {
        Self {
            issuer: "FlexVolt".to_string(),
            digits: 6,
            period: 30,
            window: 1,
            secret_bytes: 20,
            backup_code_count: 10,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Totp {
    config: TotpConfig,
}

impl Totp {
    pub fn new(config: TotpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TotpConfig {
        &self.config
    }

    /// Generate a new random base32 secret
    pub fn generate_secret(&self) -> String {
        let mut rng = rand::thread_rng();
        let bytes: Vec<u8> = (0..self.config.secret_bytes).map(|_| rng.gen()).collect();
        base32_encode(&bytes)
    }

    pub fn provisioning_uri(&self, secret: &str, account_name: &str) -> String {
        format!(
            "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits={digits}&period={period}",
            issuer = self.config.issuer,
            account = account_name,
            secret = secret,
            digits = self.config.digits,
            period = self.config.period,
        )
    }

    pub fn time_step(&self, unix_seconds: i64) -> i64 {
        unix_seconds.div_euclid(self.config.period as i64)
    }

    /// Code for a given time step
    pub fn code_at_step(&self, secret: &str, step: i64) -> Result<String, MfaError> {
        let key = base32_decode(secret).ok_or(MfaError::InvalidSecret)?;
        let mut mac = Hmac::<Sha1>::new_from_slice(&key).map_err(|_| MfaError::InvalidSecret)?;
        mac.update(&(step as u64).to_be_bytes());
        let digest = mac.finalize().into_bytes();

        // dynamic truncation
        let offset = (digest[19] & 0x0f) as usize;
        let binary = ((digest[offset] & 0x7f) as u32) << 24
            | (digest[offset + 1] as u32) << 16
            | (digest[offset + 2] as u32) << 8
            | (digest[offset + 3] as u32);
        let code = binary % 10u32.pow(self.config.digits);
        Ok(format!("{:0width$}", code, width = self.config.digits as usize))
    }

    /// Verify `code` at `unix_seconds`. Returns the matched step, which must be
    /// stored and passed back as `last_used_step` to reject replays.
    pub fn verify(
        &self,
        secret: &str,
        code: &str,
        unix_seconds: i64,
        last_used_step: Option<i64>,
    ) -> Result<i64, MfaError> {
        let code = code.trim();
        if code.len() != self.config.digits as usize || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(MfaError::InvalidTotpCode);
        }

        let current = self.time_step(unix_seconds);
        for offset in -self.config.window..=self.config.window {
            let step = current + offset;
            if constant_time_eq(self.code_at_step(secret, step)?.as_bytes(), code.as_bytes()) {
                if last_used_step.map_or(false, |last| step <= last) {
                    return Err(MfaError::CodeAlreadyUsed);
                }
                return Ok(step);
            }
        }
        Err(MfaError::InvalidTotpCode)
    }

    /// Fresh backup codes in clear text. Store only [`hash_backup_code`] output.
    pub fn generate_backup_codes(&self) -> Vec<String> {
        let mut rng = rand::thread_rng();
        (0..self.config.backup_code_count)
            .map(|_| {
                (0..8)
                    .map(|_| char::from(b'0' + rng.gen_range(0..10)))
                    .collect()
            })
            .collect()
    }
}

pub fn hash_backup_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.trim().as_bytes()))
}

/// Consume `code` from a comma separated list of hashed backup codes. Returns
/// the remaining list when the code matched.
pub fn consume_backup_code(stored: &str, code: &str) -> Option<String> {
    let hashed = hash_backup_code(code);
    let mut remaining: Vec<&str> = stored.split(',').filter(|s| !s.is_empty()).collect();
    let position = remaining.iter().position(|h| *h == hashed)?;
    remaining.remove(position);
    Some(remaining.join(","))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn base32_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for &byte in data {
        buffer = (buffer << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            let index = (buffer >> (bits - 5)) & 0x1f;
            out.push(BASE32_ALPHABET[index as usize] as char);
            bits -= 5;
        }
    }
    if bits > 0 {
        let index = (buffer << (5 - bits)) & 0x1f;
        out.push(BASE32_ALPHABET[index as usize] as char);
    }
    out
}

pub fn base32_decode(input: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for ch in input.chars().filter(|c| *c != '=' && !c.is_whitespace()) {
        let value = BASE32_ALPHABET
            .iter()
            .position(|&b| b as char == ch.to_ascii_uppercase())? as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            out.push((buffer >> (bits - 8)) as u8);
            bits -= 8;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 6238 appendix B seed "12345678901234567890"
    const RFC_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

    fn eight_digit() -> Totp {
        Totp::new(TotpConfig {
            digits: 8,
            ..TotpConfig::default()
        })
    }

    #[test]
    fn matches_rfc6238_vectors() {
        let totp = eight_digit();
        assert_eq!(totp.code_at_step(RFC_SECRET, totp.time_step(59)).unwrap(), "94287082");
        assert_eq!(
            totp.code_at_step(RFC_SECRET, totp.time_step(1111111109)).unwrap(),
            "07081804"
        );
        assert_eq!(
            totp.code_at_step(RFC_SECRET, totp.time_step(2000000000)).unwrap(),
            "69279037"
        );
    }

    #[test]
    fn base32_round_trips_seed() {
        assert_eq!(base32_encode(b"12345678901234567890"), RFC_SECRET);
        assert_eq!(base32_decode(RFC_SECRET).unwrap(), b"12345678901234567890");
    }

    #[test]
    fn accepts_adjacent_step_and_rejects_replay() {
        let totp = Totp::default();
        let secret = totp.generate_secret();
        let now = 1_700_000_000;
        let previous = totp.code_at_step(&secret, totp.time_step(now) - 1).unwrap();

        let step = totp.verify(&secret, &previous, now, None).unwrap();
        assert_eq!(step, totp.time_step(now) - 1);
        assert_eq!(
            totp.verify(&secret, &previous, now, Some(step)),
            Err(MfaError::CodeAlreadyUsed)
        );
    }

    #[test]
    fn rejects_code_outside_window() {
        let totp = Totp::default();
        let secret = totp.generate_secret();
        let now = 1_700_000_000;
        let stale = totp.code_at_step(&secret, totp.time_step(now) - 3).unwrap();
        let current = totp.code_at_step(&secret, totp.time_step(now)).unwrap();
        if stale != current {
            assert_eq!(
                totp.verify(&secret, &stale, now, None),
                Err(MfaError::InvalidTotpCode)
            );
        }
        assert_eq!(totp.verify(&secret, "12ab56", now, None), Err(MfaError::InvalidTotpCode));
    }

    #[test]
    fn backup_codes_are_single_use() {
        let totp = Totp::default();
        let codes = totp.generate_backup_codes();
        assert_eq!(codes.len(), 10);
        let stored = codes
            .iter()
            .map(|c| hash_backup_code(c))
            .collect::<Vec<_>>()
            .join(",");

        let remaining = consume_backup_code(&stored, &codes[3]).unwrap();
        assert_eq!(remaining.split(',').count(), 9);
        assert!(consume_backup_code(&remaining, &codes[3]).is_none());
    }
}
