use std::num::NonZeroUsize;

use crate::postcode::Postcode;

/// Split `codes` into consecutive batches of at most `capacity` codes, in iteration order.
///
/// Every code lands in exactly one batch; an empty input yields no batches.
pub fn plan<I>(codes: I, capacity: NonZeroUsize) -> Vec<Vec<Postcode>>
where
    I: IntoIterator<Item = Postcode>,
{
    let codes: Vec<Postcode> = codes.into_iter().collect();
    codes
        .chunks(capacity.get())
        .map(<[Postcode]>::to_vec)
        .collect()
}
