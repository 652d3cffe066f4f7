use crate::domain_model::InvitationCode;
use nanoid::nanoid;

/// Uppercase letters and digits without the look-alikes 0/O and 1/I.
const INVITATION_CODE_ALPHABET: [char; 32] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z', '2', '3', '4', '5', '6', '7', '8', '9',
];

#[derive(Debug, Clone)]
pub struct InvitationCodeGenerator {
    length: usize,
}

impl InvitationCodeGenerator {
    pub fn new(length: usize) -> Self {
        InvitationCodeGenerator {
            length: length.max(1),
        }
    }

    pub fn generate(&self) -> InvitationCode {
        let length = self.length;
        InvitationCode(nanoid!(length, &INVITATION_CODE_ALPHABET))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_use_the_configured_length_and_alphabet() {
        let generator = InvitationCodeGenerator::new(6);
        for _ in 0..64 {
            let code = generator.generate();
            assert_eq!(code.as_str().chars().count(), 6);
            assert!(
                code.as_str()
                    .chars()
                    .all(|c| INVITATION_CODE_ALPHABET.contains(&c))
            );
        }
    }
}
