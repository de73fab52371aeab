//! The data migrations.
//!
//! Every migration is one linear pass: scan the source collection(s),
//! compute corrected fields in memory, and hand the accumulated updates to
//! the run driver. The user-reference migrations all share one policy,
//! implemented by `rekey-reconcile`: a reference that already names a user
//! document key is kept, one that names a user's legacy `id` field is
//! rewritten to the document key, and anything else is dropped.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use miette::{Result, miette};
use serde_json::{Map, Value, json};

use rekey_reconcile::{
    CopyField, EntityRecord, FieldSite, FillRule, LookupIndex, collect_fill_keys, fill_mentions,
    reconcile_list, reconcile_object, reconcile_scalar,
};
use rekey_store::{Document, DocumentStore, DocumentUpdate};

pub const USERS_COLLECTION: &str = "users";
pub const CLUBS_COLLECTION: &str = "clubs";
pub const COMMENTS_COLLECTION: &str = "comments";
pub const EVENTS_COLLECTION: &str = "events";
pub const SESSIONS_COLLECTION: &str = "sessions";
pub const CIGARS_COLLECTION: &str = "cigars";

/// Bounded-size limit of the store's "field is one of" query.
pub const DEFAULT_LOOKUP_BATCH: usize = 30;

// =============================================================================
// Migration Framework Types
// =============================================================================

/// Everything a migration computed: the writes to commit and the
/// human-readable change log shown in dry-runs and logged before commit.
pub struct MigrationPlan {
    pub updates: Vec<DocumentUpdate>,
    pub changes: Vec<String>,
}

impl MigrationPlan {
    fn new() -> Self {
        Self {
            updates: Vec::new(),
            changes: Vec::new(),
        }
    }
}

/// A migration that can be planned against the store.
///
/// Planning covers the scan and compute phases and never writes; the run
/// driver owns confirmation and the single batch commit.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Unique name for this migration.
    fn name(&self) -> &'static str;

    /// Human-readable description.
    fn description(&self) -> &'static str;

    /// Scan the relevant collections and compute the corrected writes.
    async fn plan(&self, store: &dyn DocumentStore) -> Result<MigrationPlan>;
}

// =============================================================================
// Helper Functions
// =============================================================================

async fn scan(store: &dyn DocumentStore, collection: &str) -> Result<Vec<Document>> {
    store
        .list_all(collection)
        .await
        .map_err(|e| miette!("{}", e))
}

/// Build the lookup index over the users collection: the document key is
/// canonical, the `id` field is the legacy identifier.
fn build_user_index(users: &[Document]) -> LookupIndex {
    LookupIndex::build(users.iter().map(|doc| {
        EntityRecord::new(doc.key.clone(), doc.get_str("id").map(str::to_string))
    }))
}

/// Reconcile a `{base}.list` / `{base}.count` field pair. The count is
/// always rewritten together with the list so the pair stays consistent.
fn reconcile_paired_list(
    doc: &Document,
    base: &str,
    index: &LookupIndex,
    update: &mut DocumentUpdate,
    changes: &mut Vec<String>,
) -> bool {
    let list_path = format!("{base}.list");
    let Some(values) = doc.get_string_list(&list_path) else {
        return false;
    };

    let outcome = reconcile_list(FieldSite::new(&doc.key, &list_path), &values, index);
    changes.extend(outcome.diagnostics.iter().map(ToString::to_string));
    if outcome.changed {
        update.fields.insert(list_path, json!(outcome.list));
        update
            .fields
            .insert(format!("{base}.count"), json!(outcome.count));
    }
    outcome.changed
}

/// Reconcile a bare list field with no paired count.
fn reconcile_bare_list(
    doc: &Document,
    field: &str,
    index: &LookupIndex,
    update: &mut DocumentUpdate,
    changes: &mut Vec<String>,
) -> bool {
    let Some(values) = doc.get_string_list(field) else {
        return false;
    };

    let outcome = reconcile_list(FieldSite::new(&doc.key, field), &values, index);
    changes.extend(outcome.diagnostics.iter().map(ToString::to_string));
    if outcome.changed {
        update.fields.insert(field.to_string(), json!(outcome.list));
    }
    outcome.changed
}

/// Reconcile a scalar reference field; a dropped reference becomes null.
fn reconcile_scalar_field(
    doc: &Document,
    field: &str,
    index: &LookupIndex,
    update: &mut DocumentUpdate,
    changes: &mut Vec<String>,
) -> bool {
    let outcome = reconcile_scalar(FieldSite::new(&doc.key, field), doc.get_str(field), index);
    changes.extend(outcome.diagnostics.iter().map(ToString::to_string));
    if outcome.changed {
        let value = outcome.value.map_or(Value::Null, Value::String);
        update.fields.insert(field.to_string(), value);
    }
    outcome.changed
}

/// Reconcile a reference held at `field[id_property]` of an embedded
/// object; a dropped reference nulls the whole object.
fn reconcile_object_field(
    doc: &Document,
    field: &str,
    id_property: &str,
    index: &LookupIndex,
    update: &mut DocumentUpdate,
    changes: &mut Vec<String>,
) -> bool {
    let outcome = reconcile_object(
        FieldSite::new(&doc.key, field),
        doc.get(field),
        id_property,
        index,
    );
    changes.extend(outcome.diagnostics.iter().map(ToString::to_string));
    if outcome.changed {
        update
            .fields
            .insert(field.to_string(), outcome.value.unwrap_or(Value::Null));
    }
    outcome.changed
}

// =============================================================================
// Migration: User Id Backfill
// =============================================================================

/// Backfill each user's `id` field to its document key.
struct UserIdBackfill;

#[async_trait]
impl Migration for UserIdBackfill {
    fn name(&self) -> &'static str {
        "user-ids"
    }

    fn description(&self) -> &'static str {
        "Backfill the users' id field where it diverges from the document key"
    }

    async fn plan(&self, store: &dyn DocumentStore) -> Result<MigrationPlan> {
        let users = scan(store, USERS_COLLECTION).await?;
        let mut plan = MigrationPlan::new();

        for doc in &users {
            if doc.get_str("id") == Some(doc.key.as_str()) {
                continue;
            }
            let old = doc.get_str("id").unwrap_or("<missing>");
            plan.changes.push(format!(
                "User {}: field id ({}) does not match document key",
                doc.key, old
            ));
            plan.updates
                .push(DocumentUpdate::new(USERS_COLLECTION, &doc.key).set("id", json!(doc.key)));
        }

        Ok(plan)
    }
}

// =============================================================================
// Migration: User Subscriber/Subscription References
// =============================================================================

/// Repair the subscribers and subscriptions list/count pairs on users.
struct UserSubscriberRefs;

#[async_trait]
impl Migration for UserSubscriberRefs {
    fn name(&self) -> &'static str {
        "user-subscriber-refs"
    }

    fn description(&self) -> &'static str {
        "Repair users' subscribers.list and subscriptions.list user references"
    }

    async fn plan(&self, store: &dyn DocumentStore) -> Result<MigrationPlan> {
        let users = scan(store, USERS_COLLECTION).await?;
        let index = build_user_index(&users);
        let mut plan = MigrationPlan::new();

        for doc in &users {
            let mut update = DocumentUpdate::new(USERS_COLLECTION, &doc.key);
            let mut changed =
                reconcile_paired_list(doc, "subscribers", &index, &mut update, &mut plan.changes);
            changed |= reconcile_paired_list(
                doc,
                "subscriptions",
                &index,
                &mut update,
                &mut plan.changes,
            );
            if changed {
                plan.updates.push(update);
            }
        }

        Ok(plan)
    }
}

// =============================================================================
// Migration: Club Admin/Member References
// =============================================================================

/// Repair the admins and members list/count pairs on clubs.
struct ClubMemberRefs;

#[async_trait]
impl Migration for ClubMemberRefs {
    fn name(&self) -> &'static str {
        "club-member-refs"
    }

    fn description(&self) -> &'static str {
        "Repair clubs' admins.list and members.list user references"
    }

    async fn plan(&self, store: &dyn DocumentStore) -> Result<MigrationPlan> {
        let users = scan(store, USERS_COLLECTION).await?;
        let index = build_user_index(&users);
        let clubs = scan(store, CLUBS_COLLECTION).await?;
        let mut plan = MigrationPlan::new();

        for doc in &clubs {
            let mut update = DocumentUpdate::new(CLUBS_COLLECTION, &doc.key);
            let mut changed =
                reconcile_paired_list(doc, "admins", &index, &mut update, &mut plan.changes);
            changed |=
                reconcile_paired_list(doc, "members", &index, &mut update, &mut plan.changes);
            if changed {
                plan.updates.push(update);
            }
        }

        Ok(plan)
    }
}

// =============================================================================
// Migration: Comment Author/Like References
// =============================================================================

/// Repair the author and liked-users references on comments.
///
/// `likedUsers` is a bare list; comments carry no paired count field.
struct CommentAuthorRefs;

#[async_trait]
impl Migration for CommentAuthorRefs {
    fn name(&self) -> &'static str {
        "comment-author-refs"
    }

    fn description(&self) -> &'static str {
        "Repair comments' userId and likedUsers user references"
    }

    async fn plan(&self, store: &dyn DocumentStore) -> Result<MigrationPlan> {
        let users = scan(store, USERS_COLLECTION).await?;
        let index = build_user_index(&users);
        let comments = scan(store, COMMENTS_COLLECTION).await?;
        let mut plan = MigrationPlan::new();

        for doc in &comments {
            let mut update = DocumentUpdate::new(COMMENTS_COLLECTION, &doc.key);
            let mut changed =
                reconcile_scalar_field(doc, "userId", &index, &mut update, &mut plan.changes);
            changed |=
                reconcile_bare_list(doc, "likedUsers", &index, &mut update, &mut plan.changes);
            if changed {
                plan.updates.push(update);
            }
        }

        Ok(plan)
    }
}

// =============================================================================
// Migration: Event Creator/Like/Member References
// =============================================================================

/// Repair the creator object and the liked/member list pairs on events.
struct EventRefs;

#[async_trait]
impl Migration for EventRefs {
    fn name(&self) -> &'static str {
        "event-refs"
    }

    fn description(&self) -> &'static str {
        "Repair events' createdBy, likedByUserIds.list and members.list user references"
    }

    async fn plan(&self, store: &dyn DocumentStore) -> Result<MigrationPlan> {
        let users = scan(store, USERS_COLLECTION).await?;
        let index = build_user_index(&users);
        let events = scan(store, EVENTS_COLLECTION).await?;
        let mut plan = MigrationPlan::new();

        for doc in &events {
            let mut update = DocumentUpdate::new(EVENTS_COLLECTION, &doc.key);
            let mut changed = reconcile_object_field(
                doc,
                "createdBy",
                "id",
                &index,
                &mut update,
                &mut plan.changes,
            );
            changed |= reconcile_paired_list(
                doc,
                "likedByUserIds",
                &index,
                &mut update,
                &mut plan.changes,
            );
            changed |=
                reconcile_paired_list(doc, "members", &index, &mut update, &mut plan.changes);
            if changed {
                plan.updates.push(update);
            }
        }

        Ok(plan)
    }
}

// =============================================================================
// Migration: Session Creator References
// =============================================================================

/// Repair the creator reference on sessions.
struct SessionCreatorRefs;

#[async_trait]
impl Migration for SessionCreatorRefs {
    fn name(&self) -> &'static str {
        "session-creator-refs"
    }

    fn description(&self) -> &'static str {
        "Repair sessions' creatorId user reference"
    }

    async fn plan(&self, store: &dyn DocumentStore) -> Result<MigrationPlan> {
        let users = scan(store, USERS_COLLECTION).await?;
        let index = build_user_index(&users);
        let sessions = scan(store, SESSIONS_COLLECTION).await?;
        let mut plan = MigrationPlan::new();

        for doc in &sessions {
            let mut update = DocumentUpdate::new(SESSIONS_COLLECTION, &doc.key);
            if reconcile_scalar_field(doc, "creatorId", &index, &mut update, &mut plan.changes) {
                plan.updates.push(update);
            }
        }

        Ok(plan)
    }
}

// =============================================================================
// Migration: Mention Model
// =============================================================================

/// Re-shape flat cigar mentions into the wrapped `cigarMention` model.
struct MentionModel;

#[async_trait]
impl Migration for MentionModel {
    fn name(&self) -> &'static str {
        "mention-model"
    }

    fn description(&self) -> &'static str {
        "Re-shape sessions' mentions of type cigar into the cigarMention model"
    }

    async fn plan(&self, store: &dyn DocumentStore) -> Result<MigrationPlan> {
        let sessions = scan(store, SESSIONS_COLLECTION).await?;
        let mut plan = MigrationPlan::new();

        for doc in &sessions {
            let Some(mentions) = doc.get("mentions").and_then(Value::as_array) else {
                continue;
            };

            let mut changed = false;
            let new_mentions: Vec<Value> = mentions
                .iter()
                .map(|mention| {
                    if mention.get("type").and_then(Value::as_str) != Some("cigar") {
                        return mention.clone();
                    }
                    changed = true;
                    plan.changes.push(format!(
                        "Session {}: migrated cigar mention with referenceId {} to new model",
                        doc.key,
                        mention
                            .get("referenceId")
                            .and_then(Value::as_str)
                            .unwrap_or("<missing>")
                    ));
                    json!({
                        "cigarMention": {
                            "referenceId": mention.get("referenceId").cloned().unwrap_or(Value::Null),
                            "name": mention.get("name").cloned().unwrap_or(Value::Null),
                            "description": mention.get("description").cloned().unwrap_or(Value::Null),
                        }
                    })
                })
                .collect();

            if changed {
                plan.updates.push(
                    DocumentUpdate::new(SESSIONS_COLLECTION, &doc.key)
                        .set("mentions", Value::Array(new_mentions)),
                );
            }
        }

        Ok(plan)
    }
}

// =============================================================================
// Migration: Cigar Mention Fill
// =============================================================================

/// Fill missing cigar fields on sessions' cigar mentions.
///
/// Eligible mentions (missing `brand`) get fields copied from the cigars
/// collection, looked up in bounded batches, with safe defaults when the
/// cigar is gone.
struct CigarMentionFill {
    lookup_batch: usize,
}

fn cigar_fill_rule() -> FillRule {
    let fixed = json!({
        "cigarRating": {
            "appearance": 0,
            "aroma": 0,
            "flavor": 0,
            "burn": 0,
            "totalRatings": 0
        },
        "flavorProfile": {
            "coffee": 0,
            "chocolate": 0,
            "cream": 0,
            "nuts": 0,
            "fruit": 0,
            "wood": 0,
            "spice": 0,
            "herb": 0,
            "earth": 0,
            "leather": 0
        }
    });

    FillRule {
        wrapper: "cigarMention".to_string(),
        reference_property: "referenceId".to_string(),
        required_property: "brand".to_string(),
        carried: vec![
            "referenceId".to_string(),
            "name".to_string(),
            "description".to_string(),
        ],
        copied: vec![
            CopyField::new("brand", "brand", json!("")),
            CopyField::new("country", "countryKeys.location", json!("")),
            CopyField::new("strength", "strength", json!(0)),
            CopyField::new("imageUrl", "imageUrl", json!("")),
        ],
        fixed: fixed.as_object().expect("fixed defaults are an object").clone(),
    }
}

#[async_trait]
impl Migration for CigarMentionFill {
    fn name(&self) -> &'static str {
        "cigar-mention-fill"
    }

    fn description(&self) -> &'static str {
        "Fill missing cigar fields on sessions' cigar mentions from the cigars collection"
    }

    async fn plan(&self, store: &dyn DocumentStore) -> Result<MigrationPlan> {
        let sessions = scan(store, SESSIONS_COLLECTION).await?;
        let rule = cigar_fill_rule();
        let mut plan = MigrationPlan::new();

        // Distinct cigar keys referenced by mentions still missing a brand.
        let mut missing: BTreeSet<String> = BTreeSet::new();
        for doc in &sessions {
            if let Some(mentions) = doc.get("mentions").and_then(Value::as_array) {
                missing.extend(collect_fill_keys(mentions, &rule));
            }
        }
        if missing.is_empty() {
            return Ok(plan);
        }

        let missing: Vec<String> = missing.into_iter().collect();
        let mut canon: HashMap<String, Map<String, Value>> = HashMap::new();
        for batch in missing.chunks(self.lookup_batch) {
            let cigars = store
                .query_in(CIGARS_COLLECTION, "id", batch)
                .await
                .map_err(|e| miette!("{}", e))?;
            for cigar in cigars {
                canon.insert(cigar.key.clone(), cigar.fields);
            }
        }

        for doc in &sessions {
            let Some(mentions) = doc.get("mentions").and_then(Value::as_array) else {
                continue;
            };

            // smokedAt is stamped from the owning session's createdAt.
            let mut extra = Map::new();
            if let Some(created_at) = doc.get("createdAt") {
                extra.insert("smokedAt".to_string(), created_at.clone());
            }

            if let Some(new_mentions) = fill_mentions(mentions, &rule, &canon, &extra) {
                plan.changes.push(format!(
                    "Session {}: filled missing cigar mention fields",
                    doc.key
                ));
                plan.updates.push(
                    DocumentUpdate::new(SESSIONS_COLLECTION, &doc.key)
                        .set("mentions", Value::Array(new_mentions)),
                );
            }
        }

        Ok(plan)
    }
}

// =============================================================================
// Migration Registry
// =============================================================================

/// All available migrations, in the order `--all` runs them.
pub fn available_migrations(lookup_batch: usize) -> Vec<Box<dyn Migration>> {
    vec![
        Box::new(UserIdBackfill),
        Box::new(UserSubscriberRefs),
        Box::new(ClubMemberRefs),
        Box::new(CommentAuthorRefs),
        Box::new(EventRefs),
        Box::new(SessionCreatorRefs),
        Box::new(MentionModel),
        Box::new(CigarMentionFill { lookup_batch }),
    ]
}
