//! Apache `$apr1$` (salted MD5-crypt) password hashing for
//! `auth_basic_user_file` entries.

use md5::{Digest, Md5};
use rand::Rng;

const MAGIC: &str = "$apr1$";
const ITOA64: &[u8; 64] = b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const SALT_LEN: usize = 8;
const ROUNDS: usize = 1000;

/// Hash `password` with a fresh random salt.
pub fn hash(password: &str) -> String {
    let mut rng = rand::thread_rng();
    let salt: String = (0..SALT_LEN)
        .map(|_| ITOA64[rng.gen_range(0..ITOA64.len())] as char)
        .collect();
    hash_with_salt(password, &salt)
}

/// Hash `password` with an explicit salt (at most 8 characters are used).
pub fn hash_with_salt(password: &str, salt: &str) -> String {
    let salt = &salt.as_bytes()[..salt.len().min(SALT_LEN)];
    let pw = password.as_bytes();

    let mut alternate = Md5::new();
    alternate.update(pw);
    alternate.update(salt);
    alternate.update(pw);
    let alternate = alternate.finalize();

    let mut ctx = Md5::new();
    ctx.update(pw);
    ctx.update(MAGIC.as_bytes());
    ctx.update(salt);

    let mut remaining = pw.len();
    while remaining > 0 {
        let n = remaining.min(16);
        ctx.update(&alternate.as_slice()[..n]);
        remaining -= n;
    }

    let mut bits = pw.len();
    while bits > 0 {
        if bits & 1 == 1 {
            ctx.update([0u8]);
        } else {
            ctx.update(&pw[..1]);
        }
        bits >>= 1;
    }

    let mut digest = ctx.finalize();
    for round in 0..ROUNDS {
        let mut next = Md5::new();
        if round & 1 == 1 {
            next.update(pw);
        } else {
            next.update(digest.as_slice());
        }
        if round % 3 != 0 {
            next.update(salt);
        }
        if round % 7 != 0 {
            next.update(pw);
        }
        if round & 1 == 1 {
            next.update(digest.as_slice());
        } else {
            next.update(pw);
        }
        digest = next.finalize();
    }

    let d = digest.as_slice();
    let mut encoded = String::with_capacity(22);
    for (a, b, c) in [(0, 6, 12), (1, 7, 13), (2, 8, 14), (3, 9, 15), (4, 10, 5)] {
        let value = (u32::from(d[a]) << 16) | (u32::from(d[b]) << 8) | u32::from(d[c]);
        push_base64(&mut encoded, value, 4);
    }
    push_base64(&mut encoded, u32::from(d[11]), 2);

    format!("{MAGIC}{}${encoded}", String::from_utf8_lossy(salt))
}

fn push_base64(out: &mut String, mut value: u32, chars: usize) {
    for _ in 0..chars {
        out.push(ITOA64[(value & 0x3f) as usize] as char);
        value >>= 6;
    }
}
