// https://www.rfc-editor.org/rfc/rfc9285

const ALPHABET: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Base45Error {
    #[error("invalid base45 character '{0}'")]
    InvalidCharacter(char),
    #[error("invalid base45 length {0}")]
    InvalidLength(usize),
    #[error("base45 triplet out of range")]
    Overflow,
}

fn value_of(c: u8) -> Result<u32, Base45Error> {
    ALPHABET
        .iter()
        .position(|&a| a == c)
        .map(|p| p as u32)
        .ok_or(Base45Error::InvalidCharacter(c as char))
}

pub fn decode(input: &str) -> Result<Vec<u8>, Base45Error> {
    let bytes = input.as_bytes();
    if bytes.len() % 3 == 1 {
        return Err(Base45Error::InvalidLength(bytes.len()));
    }
    let mut out = Vec::with_capacity(bytes.len() / 3 * 2 + 1);
    for chunk in bytes.chunks(3) {
        let mut n = 0u32;
        for (i, &c) in chunk.iter().enumerate() {
            n += value_of(c)? * 45u32.pow(i as u32);
        }
        if chunk.len() == 3 {
            if n > 0xffff {
                return Err(Base45Error::Overflow);
            }
            out.push((n >> 8) as u8);
            out.push((n & 0xff) as u8);
        } else {
            if n > 0xff {
                return Err(Base45Error::Overflow);
            }
            out.push(n as u8);
        }
    }
    Ok(out)
}

pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() / 2 * 3 + 2);
    for chunk in data.chunks(2) {
        let (mut n, digits) = match *chunk {
            [a, b] => ((a as u32) << 8 | b as u32, 3),
            [a] => (a as u32, 2),
            _ => continue,
        };
        for _ in 0..digits {
            out.push(ALPHABET[(n % 45) as usize] as char);
            n /= 45;
        }
    }
    out
}
