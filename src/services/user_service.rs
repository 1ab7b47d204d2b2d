use std::time::SystemTime;

use tracing::debug;

use crate::dao::{models::UserEntity, round_store::RoundStore, storage::StorageResult};

/// Look up the user owning `wallet_address`, registering it on first sight.
///
/// Two requests registering the same wallet race on the store's unique wallet
/// index; the loser re-reads the winner's row.
pub async fn get_or_create_user(
    store: &dyn RoundStore,
    wallet_address: &str,
    now: SystemTime,
) -> StorageResult<UserEntity> {
    if let Some(user) = store.find_user_by_wallet(wallet_address.to_owned()).await? {
        return Ok(user);
    }

    let user = UserEntity::new(wallet_address, now);
    match store.insert_user(user.clone()).await {
        Ok(()) => {
            debug!(user_id = %user.id, "registered wallet");
            Ok(user)
        }
        Err(err) if err.is_conflict() => store
            .find_user_by_wallet(wallet_address.to_owned())
            .await?
            .ok_or(err),
        Err(err) => Err(err),
    }
}
