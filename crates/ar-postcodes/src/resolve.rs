use crate::{
    cache::{CacheStore, LocationCache},
    client::Client,
    error::ResolveError,
    payload::Payload,
    postcode::Postcode,
};

/// Make sure every required postcode has a location, looking up only the ones `cache` lacks.
///
/// When nothing is missing the cache is returned as is, with no request and no write; a lookup
/// that brings back no records writes nothing either. Otherwise the looked up records are
/// merged into a copy of `cache`, the copy is persisted through `store` and returned. Any
/// failure leaves the persisted cache untouched.
pub async fn resolve<I>(
    client: &Client,
    store: &CacheStore,
    cache: &LocationCache,
    required: I,
    payload: &Payload,
) -> Result<LocationCache, ResolveError>
where
    I: IntoIterator<Item = Postcode>,
{
    let missing = cache.missing(required);
    if missing.is_empty() {
        log::info!("all postcodes already cached");
        return Ok(cache.clone());
    }
    log::info!("{} postcodes missing from the cache", missing.len());

    let records = client.fetch_all(missing, payload).await?;
    if records.is_empty() {
        return Ok(cache.clone());
    }
    let mut merged = cache.clone();
    merged.extend(records)?;
    store.save(&merged).await?;
    Ok(merged)
}
