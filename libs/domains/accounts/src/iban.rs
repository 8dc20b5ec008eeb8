//! IBAN normalization and validation (ISO 13616, ISO 7064 mod-97).

use thiserror::Error;

/// Registered IBAN length per country code.
const COUNTRY_LENGTHS: &[(&str, usize)] = &[
    ("AD", 24), ("AE", 23), ("AL", 28), ("AT", 20), ("AZ", 28), ("BA", 20), ("BE", 16),
    ("BG", 22), ("BH", 22), ("BR", 29), ("BY", 28), ("CH", 21), ("CR", 22), ("CY", 28),
    ("CZ", 24), ("DE", 22), ("DK", 18), ("DO", 28), ("EE", 20), ("EG", 29), ("ES", 24),
    ("FI", 18), ("FO", 18), ("FR", 27), ("GB", 22), ("GE", 22), ("GI", 23), ("GL", 18),
    ("GR", 27), ("GT", 28), ("HR", 21), ("HU", 28), ("IE", 22), ("IL", 23), ("IQ", 23),
    ("IS", 26), ("IT", 27), ("JO", 30), ("KW", 30), ("KZ", 20), ("LB", 28), ("LC", 32),
    ("LI", 21), ("LT", 20), ("LU", 20), ("LV", 21), ("MC", 27), ("MD", 24), ("ME", 22),
    ("MK", 19), ("MR", 27), ("MT", 31), ("MU", 30), ("NL", 18), ("NO", 15), ("PK", 24),
    ("PL", 28), ("PS", 29), ("PT", 25), ("QA", 29), ("RO", 24), ("RS", 22), ("SA", 24),
    ("SC", 31), ("SE", 24), ("SI", 19), ("SK", 24), ("SM", 27), ("ST", 25), ("SV", 28),
    ("TL", 23), ("TN", 24), ("TR", 26), ("UA", 29), ("VA", 22), ("VG", 24), ("XK", 20),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IbanError {
    #[error("{0} is not a valid country code for IBAN.")]
    UnknownCountry(String),

    #[error("{country} IBANs must contain {expected} characters.")]
    InvalidLength { country: String, expected: usize },

    #[error("Not a valid IBAN.")]
    InvalidCharacters,

    #[error("Not a valid IBAN.")]
    InvalidChecksum,
}

impl IbanError {
    /// Stable identifier used as the field error code
    pub fn code(&self) -> &'static str {
        match self {
            IbanError::UnknownCountry(_) => "iban_country",
            IbanError::InvalidLength { .. } => "iban_length",
            IbanError::InvalidCharacters => "iban_characters",
            IbanError::InvalidChecksum => "iban_checksum",
        }
    }
}

/// Removes all whitespace and upper-cases the value.
pub fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Registered length for a two-letter country code.
pub fn country_length(country: &str) -> Option<usize> {
    COUNTRY_LENGTHS
        .iter()
        .find(|(code, _)| *code == country)
        .map(|(_, len)| *len)
}

/// Validates `value` and returns its compact upper-case form.
pub fn validate(value: &str) -> Result<String, IbanError> {
    let iban = normalize(value);

    if !iban.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(IbanError::InvalidCharacters);
    }

    let country: String = iban.chars().take(2).collect();
    let expected = country_length(&country).ok_or_else(|| IbanError::UnknownCountry(country.clone()))?;

    if iban.len() != expected {
        return Err(IbanError::InvalidLength { country, expected });
    }

    if !iban[2..4].chars().all(|c| c.is_ascii_digit()) {
        return Err(IbanError::InvalidChecksum);
    }

    if checksum(&iban) != 1 {
        return Err(IbanError::InvalidChecksum);
    }

    Ok(iban)
}

/// Remainder of the rearranged IBAN modulo 97; valid IBANs yield 1.
fn checksum(iban: &str) -> u32 {
    let rearranged = iban[4..].chars().chain(iban[..4].chars());

    rearranged.fold(0u32, |acc, c| {
        // Digits map to themselves, letters to 10..=35
        let value = c.to_digit(36).unwrap_or(0);
        if value < 10 {
            (acc * 10 + value) % 97
        } else {
            (acc * 100 + value) % 97
        }
    })
}
