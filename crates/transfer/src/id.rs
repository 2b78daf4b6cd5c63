//! Upload id generation.

use rand::Rng;

/// Prefix shared by every generated upload id.
const UPLOAD_ID_PREFIX: &str = "upload_";

/// Number of random base-36 characters after the prefix.
const UPLOAD_ID_RANDOM_LEN: usize = 26;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generates an opaque upload id such as `upload_k3f9...`.
pub fn generate_upload_id() -> String {
    let mut rng = rand::thread_rng();
    let mut id = String::with_capacity(UPLOAD_ID_PREFIX.len() + UPLOAD_ID_RANDOM_LEN);
    id.push_str(UPLOAD_ID_PREFIX);
    for _ in 0..UPLOAD_ID_RANDOM_LEN {
        id.push(BASE36[rng.gen_range(0..BASE36.len())] as char);
    }
    id
}
