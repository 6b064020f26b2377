//! Replica key layout and collection names

/// Collection mirroring every bucket record
pub const BUCKET_COLLECTION: &str = "BucketMetadata";
/// Collection of files shared with the user
pub const SHARED_WITH_ME_COLLECTION: &str = "SharedFileMetadata";
/// Collection of files the user shared
pub const SHARED_BY_ME_COLLECTION: &str = "SharedByMeFileMetadata";
/// Collection of users the user recently shared with
pub const RECENTLY_SHARED_WITH_COLLECTION: &str = "RecentlySharedWithMetadata";

/// Key of the notifications watermark
pub const NOTIFICATIONS_LAST_SEEN_AT: &str = "notifications/lastSeenAt";

pub fn bucket_key(slug: &str, owner: &str) -> String {
    format!("bucketSchema/{}/{}", slug, owner)
}

pub fn file_metadata_key(bucket_slug: &str, db_id: &str, path: &str) -> String {
    format!("fileMetadata/{}/{}/{}", bucket_slug, db_id, path)
}

/// Uuid index key, used in both the private and the public namespace
pub fn uuid_key(uuid: &str) -> String {
    format!("/fuuid/{}", uuid)
}

pub fn shared_with_me_key(bucket_slug: &str, db_id: &str, path: &str) -> String {
    format!("sharedWithMe/{}/{}/{}", bucket_slug, db_id, path)
}

pub fn shared_by_me_key(bucket_slug: &str, db_id: &str, path: &str) -> String {
    format!("sharedByMe/{}/{}/{}", bucket_slug, db_id, path)
}

pub fn invitation_key(invitation_id: &str) -> String {
    format!("sharedFileIv/{}", invitation_id)
}

pub fn recently_shared_with_key(public_key: &str) -> String {
    format!("recentlySharedWith/{}", public_key)
}
