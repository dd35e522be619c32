/// XORs `payload` in place with `mask_key`, cycling the key every 4 bytes.
/// Masking and unmasking are the same operation.
pub(crate) fn mask(payload: &mut [u8], mask_key: [u8; 4]) {
    let key = u32::from_ne_bytes(mask_key);
    let mut words = payload.chunks_exact_mut(4);
    for word in &mut words {
        let masked = u32::from_ne_bytes([word[0], word[1], word[2], word[3]]) ^ key;
        word.copy_from_slice(&masked.to_ne_bytes());
    }

    // chunks are 4-aligned so the tail restarts at key index 0
    for (b, k) in words.into_remainder().iter_mut().zip(mask_key) {
        *b ^= k;
    }
}
