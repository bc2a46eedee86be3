//! Tag Index
//!
//! Tags are the only mutable pointers in the broker. A (participant, tag)
//! pair points at zero or one version; each move or removal is appended
//! to the pair's chain so older snapshots keep seeing the old target.
//! Tagging unrelated participants only contends on DashMap shards, never
//! on a global lock.

use std::collections::BTreeSet;

use accord_core::{AccordError, ParticipantName, Result, TagName, VersionId};
use dashmap::DashMap;
use rustc_hash::FxHashSet;
use tracing::{debug, info};

use crate::chain::VersionChain;
use crate::stores::WriteContext;
use crate::wal::LogRecord;

/// Key of one tag pointer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagKey {
    /// Tagged participant
    pub participant: ParticipantName,
    /// Tag name
    pub tag: TagName,
}

/// What a tag change did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagChange {
    /// The tag already pointed at the requested target
    Unchanged,
    /// The tag was attached for the first time (or after removal)
    Attached,
    /// The tag moved away from this version
    Moved {
        /// Previous target
        from: VersionId,
    },
    /// The tag was removed from this version
    Removed {
        /// Previous target
        from: VersionId,
    },
}

/// Mutable tag → version pointers
#[derive(Debug, Default)]
pub struct TagIndex {
    /// `None` entries are removals
    chains: DashMap<TagKey, VersionChain<Option<VersionId>>>,
    by_participant: DashMap<ParticipantName, FxHashSet<TagName>>,
}

impl TagIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Point `tag` at `version`, moving it if it is elsewhere
    ///
    /// Idempotent. Registers the participant and version.
    pub fn tag(
        &self,
        participant: &ParticipantName,
        version: &VersionId,
        tag: &TagName,
        ctx: &WriteContext<'_>,
    ) -> Result<TagChange> {
        let key = TagKey {
            participant: participant.clone(),
            tag: tag.clone(),
        };
        let mut chain = self.chains.entry(key).or_default();
        let previous = chain.latest().and_then(|e| e.value.clone());
        if previous.as_ref() == Some(version) {
            debug!(%participant, %version, %tag, "tag already in place");
            return Ok(TagChange::Unchanged);
        }

        ctx.wal.append(&LogRecord::Tag {
            participant: participant.clone(),
            version: version.clone(),
            tag: tag.clone(),
        })?;
        let ticket = ctx.clock.begin();
        chain.push(ticket.version(), Some(version.clone()));
        ctx.registry.register(participant, Some(version), ticket.version());
        self.by_participant
            .entry(participant.clone())
            .or_default()
            .insert(tag.clone());
        drop(chain);
        drop(ticket);

        match previous {
            Some(from) => {
                info!(%participant, %version, %tag, %from, "moved tag");
                Ok(TagChange::Moved { from })
            }
            None => {
                info!(%participant, %version, %tag, "attached tag");
                Ok(TagChange::Attached)
            }
        }
    }

    /// Remove `tag` from whichever version carries it
    ///
    /// Removing an absent tag is a no-op. Fails with `UnknownParticipant`
    /// when the participant has never been seen.
    pub fn untag(
        &self,
        participant: &ParticipantName,
        tag: &TagName,
        ctx: &WriteContext<'_>,
    ) -> Result<TagChange> {
        if !ctx.registry.contains(participant, u64::MAX) {
            return Err(AccordError::UnknownParticipant(participant.to_string()));
        }
        let key = TagKey {
            participant: participant.clone(),
            tag: tag.clone(),
        };
        let mut chain = match self.chains.get_mut(&key) {
            Some(chain) => chain,
            None => return Ok(TagChange::Unchanged),
        };
        let previous = match chain.latest().and_then(|e| e.value.clone()) {
            Some(v) => v,
            None => return Ok(TagChange::Unchanged),
        };

        ctx.wal.append(&LogRecord::Untag {
            participant: participant.clone(),
            tag: tag.clone(),
        })?;
        let ticket = ctx.clock.begin();
        chain.push(ticket.version(), None);
        drop(chain);
        drop(ticket);

        info!(%participant, %tag, from = %previous, "removed tag");
        Ok(TagChange::Removed { from: previous })
    }

    /// Versions carrying `tag` at `at`
    ///
    /// Holds at most one version. Unknown participants and tags yield an
    /// empty set.
    pub fn versions_for_tag(
        &self,
        participant: &ParticipantName,
        tag: &TagName,
        at: u64,
    ) -> BTreeSet<VersionId> {
        let key = TagKey {
            participant: participant.clone(),
            tag: tag.clone(),
        };
        self.chains
            .get(&key)
            .and_then(|chain| chain.latest_at(at).and_then(|e| e.value.clone()))
            .into_iter()
            .collect()
    }

    /// Tags currently pointing at `version`, sorted
    pub fn tags_for(&self, participant: &ParticipantName, version: &VersionId, at: u64) -> Vec<TagName> {
        let tags: Vec<TagName> = self
            .by_participant
            .get(participant)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        let mut carried: Vec<TagName> = tags
            .into_iter()
            .filter(|tag| self.versions_for_tag(participant, tag, at).contains(version))
            .collect();
        carried.sort();
        carried
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::Stores;
    use crate::wal::NoWal;

    fn name(s: &str) -> ParticipantName {
        ParticipantName::new(s).unwrap()
    }

    fn ver(s: &str) -> VersionId {
        VersionId::new(s).unwrap()
    }

    fn tag(s: &str) -> TagName {
        TagName::new(s).unwrap()
    }

    #[test]
    fn test_tag_is_idempotent() {
        let stores = Stores::new();
        let ctx = stores.write_context(&NoWal);
        assert_eq!(stores.tags.tag(&name("web"), &ver("1"), &tag("main"), &ctx).unwrap(), TagChange::Attached);
        assert_eq!(stores.tags.tag(&name("web"), &ver("1"), &tag("main"), &ctx).unwrap(), TagChange::Unchanged);
        assert_eq!(stores.clock.visible(), 1);
    }

    #[test]
    fn test_retag_moves_pointer() {
        let stores = Stores::new();
        let ctx = stores.write_context(&NoWal);
        stores.tags.tag(&name("web"), &ver("1"), &tag("main"), &ctx).unwrap();
        let change = stores.tags.tag(&name("web"), &ver("2"), &tag("main"), &ctx).unwrap();
        assert_eq!(change, TagChange::Moved { from: ver("1") });

        let now = stores.tags.versions_for_tag(&name("web"), &tag("main"), u64::MAX);
        assert_eq!(now.into_iter().collect::<Vec<_>>(), vec![ver("2")]);
        // snapshot before the move still sees the old target
        let then = stores.tags.versions_for_tag(&name("web"), &tag("main"), 1);
        assert_eq!(then.into_iter().collect::<Vec<_>>(), vec![ver("1")]);
        assert!(stores.tags.tags_for(&name("web"), &ver("1"), u64::MAX).is_empty());
    }

    #[test]
    fn test_untag_and_unknown_lookups() {
        let stores = Stores::new();
        let ctx = stores.write_context(&NoWal);
        assert!(stores.tags.versions_for_tag(&name("web"), &tag("prod"), u64::MAX).is_empty());
        assert!(matches!(
            stores.tags.untag(&name("web"), &tag("prod"), &ctx),
            Err(AccordError::UnknownParticipant(_))
        ));

        stores.tags.tag(&name("web"), &ver("1"), &tag("prod"), &ctx).unwrap();
        assert_eq!(
            stores.tags.untag(&name("web"), &tag("prod"), &ctx).unwrap(),
            TagChange::Removed { from: ver("1") }
        );
        assert_eq!(stores.tags.untag(&name("web"), &tag("prod"), &ctx).unwrap(), TagChange::Unchanged);
        assert!(stores.tags.versions_for_tag(&name("web"), &tag("prod"), u64::MAX).is_empty());

        // retagging after removal attaches again
        assert_eq!(stores.tags.tag(&name("web"), &ver("1"), &tag("prod"), &ctx).unwrap(), TagChange::Attached);
    }

    #[test]
    fn test_tags_for_version() {
        let stores = Stores::new();
        let ctx = stores.write_context(&NoWal);
        stores.tags.tag(&name("web"), &ver("1"), &tag("main"), &ctx).unwrap();
        stores.tags.tag(&name("web"), &ver("1"), &tag("prod"), &ctx).unwrap();
        stores.tags.tag(&name("web"), &ver("2"), &tag("test"), &ctx).unwrap();
        assert_eq!(stores.tags.tags_for(&name("web"), &ver("1"), u64::MAX), vec![tag("main"), tag("prod")]);
    }
}
