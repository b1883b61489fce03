use chrono::{Datelike, Utc};
use rand::Rng;

const DIGITS: &[u8] = b"0123456789";
const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a candidate case code for the current year: `YYYY` + 3 digits + 3 uppercase letters.
///
/// Uniqueness is enforced by the `issue_cases_case_code_key` constraint; callers retry on collision.
pub fn generate() -> String {
    generate_for_year(Utc::now().year(), &mut rand::thread_rng())
}

pub fn generate_for_year<R: Rng + ?Sized>(year: i32, rng: &mut R) -> String {
    let mut code = format!("{:04}", year);
    for _ in 0..3 {
        code.push(DIGITS[rng.gen_range(0..DIGITS.len())] as char);
    }
    for _ in 0..3 {
        code.push(LETTERS[rng.gen_range(0..LETTERS.len())] as char);
    }
    code
}

/// True when `code` has the `YYYY` + `NNN` + `AAA` shape
pub fn is_valid(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 10
        && bytes[..7].iter().all(u8::is_ascii_digit)
        && bytes[7..].iter().all(u8::is_ascii_uppercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn generated_codes_match_pattern() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let code = generate_for_year(2026, &mut rng);
            assert!(is_valid(&code), "bad code {}", code);
            assert!(code.starts_with("2026"));
        }
    }

    #[test]
    fn uses_current_year() {
        let code = generate();
        assert!(code.starts_with(&Utc::now().year().to_string()));
        assert!(is_valid(&code));
    }

    #[test]
    fn validates_shape() {
        assert!(is_valid("2025123ABC"));
        assert!(!is_valid("2025123abc"));
        assert!(!is_valid("2025ABC123"));
        assert!(!is_valid("2025123AB"));
        assert!(!is_valid("2025-123ABC"));
    }
}
