use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Room join codes are short and case-insensitive on entry, so they are
/// generated uppercase.
pub fn generate_join_code(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect()
}

/// Random prefix for stored upload files, keeps original names from colliding.
pub fn generate_file_stem(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_code_is_uppercase_and_sized() {
        let code = generate_join_code(6);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
