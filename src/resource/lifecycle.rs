// ============================================================================
// Lifecycle coordination: create / update / destroy / save / reload
// ============================================================================
//
// States: New -> Persisted on a successful create, Persisted -> New on a
// successful destroy. Store-facing calls report a row-count mismatch as
// `Ok(false)`; `Err` is reserved for repository and lock failures.
//
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;
use tracing::{Instrument, Level, event, info_span};

use super::{ChangeTracker, Resource, identity};
use crate::core::{DbError, Key, Result, Value};
use crate::model::Property;
use crate::repository::{Query, Record};

/// Marks a cascade as running on one resource; re-entering returns `None`.
struct RunOnce<'a>(&'a AtomicBool);

impl<'a> RunOnce<'a> {
    fn enter(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunOnce<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Resource {
    /// Saves parent associations, then this resource.
    ///
    /// Every parent save is attempted; the result is true only when all of
    /// them and the resource itself succeeded. A save reached again through
    /// an association cycle returns true without doing anything.
    pub async fn save(&self) -> Result<bool> {
        self.save_with_context("default").await
    }

    /// `save` with a named validation context. The context is carried into
    /// the tracing span for external validators; it does not change what is
    /// written.
    pub async fn save_with_context(&self, context: &str) -> Result<bool> {
        let Some(_running) = RunOnce::enter(&self.inner.saving) else {
            return Ok(true);
        };

        let span = info_span!(
            "resource.save",
            model = %self.model().name(),
            context = %context
        );

        async {
            let parents_saved = self.save_parents().await?;
            let saved = self.save_self().await?;
            Ok::<_, DbError>(parents_saved && saved)
        }
        .instrument(span)
        .await
    }

    /// Creates or updates this resource alone, without cascading.
    pub async fn save_self(&self) -> Result<bool> {
        if self.is_new()? {
            self.create().await
        } else {
            self.update_dirty().await
        }
    }

    async fn save_parents(&self) -> Result<bool> {
        if !self.config().cascade {
            return Ok(true);
        }

        let mut all_saved = true;
        let mut first_error = None;
        for parent in self.parents()? {
            match parent.save().await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(
                        "parent save failed: model='{}' key={:?}",
                        self.model().name(),
                        self.key()?
                    );
                    all_saved = false;
                }
                Err(err) => {
                    all_saved = false;
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(all_saved),
        }
    }

    /// Inserts a new resource.
    ///
    /// Returns false without touching the store when nothing was assigned
    /// and no key is generated by the store. Unloaded attributes receive
    /// their defaults first. Exactly one row must be created.
    pub async fn create(&self) -> Result<bool> {
        let properties = self.properties()?;
        let unloaded: Vec<Arc<Property>> = {
            let state = self.read_state()?;
            if !state.identity.is_new() {
                event!(Level::DEBUG, model = %self.model().name(), "create skipped: already persisted");
                return Ok(false);
            }

            let tracker = ChangeTracker::new(&properties, &state.attributes, true);
            if tracker.dirty_attributes().is_empty() && !properties.has_serial_key() {
                event!(Level::DEBUG, model = %self.model().name(), "create skipped: nothing to persist");
                return Ok(false);
            }

            properties
                .iter()
                .filter(|property| !state.attributes.is_loaded(property.name()))
                .cloned()
                .collect()
        };

        // Providers may read this resource, so no lock is held while they run.
        for property in unloaded {
            let value = property.default_for(self);
            let mut state = self.write_state()?;
            if !state.attributes.is_loaded(property.name()) {
                state.attributes.set(property.name(), value);
            }
        }

        let repository = self.repository()?;
        let created = repository.create(std::slice::from_ref(self)).await?;
        if created != 1 {
            warn!(
                "create affected {} rows: model='{}' repository='{}'",
                created,
                self.model().name(),
                repository.name()
            );
            return Ok(false);
        }

        let key = {
            let mut state = self.write_state()?;
            state.identity.mark_persisted(repository.clone());
            state.attributes.checkpoint();
            identity::persisted_key(&properties.key(), &state.attributes)
        };

        if self.config().identity_map {
            repository.identity_map(self.model().name())?.set(key.clone(), self)?;
        }

        event!(Level::DEBUG, model = %self.model().name(), key = ?key, "resource created");
        Ok(true)
    }

    /// Mass-assigns `attributes` (only the names in `allowed`, when given)
    /// and writes the result.
    ///
    /// A persisted resource first loads any assigned lazy attribute, then
    /// issues one update with exactly its dirty attributes, addressed by its
    /// persisted key; a new one is created.
    pub async fn update<I, K, V>(&self, attributes: I, allowed: Option<&[&str]>) -> Result<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut assignments: Vec<(String, Value)> = Vec::new();
        for (name, value) in attributes {
            let name = name.as_ref();
            if let Some(allowed) = allowed {
                let public_name = name.strip_suffix('?').unwrap_or(name);
                if !allowed.contains(&public_name) {
                    if self.config().strict_mass_assignment {
                        return Err(DbError::Naming {
                            model: self.model().name().to_string(),
                            setter: public_name.to_string(),
                        });
                    }
                    continue;
                }
            }
            assignments.push((name.to_string(), value.into()));
        }

        // Stored values must be known before assigning, so writing back an
        // unchanged value is not mistaken for a change.
        let properties = self.properties()?;
        for (name, _) in &assignments {
            let name = name.strip_suffix('?').unwrap_or(name);
            if properties.contains(name) {
                self.lazy_load(name).await?;
            }
        }

        self.assign_attributes(assignments)?;
        self.save_self().await
    }

    async fn update_dirty(&self) -> Result<bool> {
        let properties = self.properties()?;
        let (changes, old_key) = {
            let state = self.read_state()?;
            if state.identity.is_new() {
                return Ok(false);
            }
            let changes = ChangeTracker::new(&properties, &state.attributes, false).dirty_attributes();
            (changes, identity::persisted_key(&properties.key(), &state.attributes))
        };

        if changes.is_empty() {
            return Ok(true);
        }

        let repository = self.repository()?;
        let query = self.query_for_key(&old_key)?;
        let affected = repository.update(&changes, &query).await?;
        if affected != 1 {
            warn!(
                "update affected {} rows: model='{}' key={:?}",
                affected,
                self.model().name(),
                old_key
            );
            return Ok(false);
        }

        let new_key = {
            let mut state = self.write_state()?;
            state.attributes.checkpoint();
            identity::persisted_key(&properties.key(), &state.attributes)
        };

        if self.config().identity_map && new_key != old_key {
            let identity_map = repository.identity_map(self.model().name())?;
            identity_map.delete(&old_key)?;
            identity_map.set(new_key.clone(), self)?;
        }

        event!(
            Level::DEBUG,
            model = %self.model().name(),
            key = ?new_key,
            attributes = changes.len(),
            "resource updated"
        );
        Ok(true)
    }

    /// Deletes the stored row.
    ///
    /// A new resource, or a delete that removes nothing, returns false and
    /// leaves the resource as it was. Afterwards the resource reads as a
    /// never-saved one: its loaded values all count as changes.
    pub async fn destroy(&self) -> Result<bool> {
        let properties = self.properties()?;
        let key = {
            let state = self.read_state()?;
            if state.identity.is_new() {
                return Ok(false);
            }
            identity::persisted_key(&properties.key(), &state.attributes)
        };

        let repository = self.repository()?;
        let query = self.query_for_key(&key)?;
        if !repository.delete(&query).await? {
            warn!(
                "destroy removed no row: model='{}' key={:?}",
                self.model().name(),
                key
            );
            return Ok(false);
        }

        {
            let mut state = self.write_state()?;
            state.identity.mark_new();
            state.attributes.forget_persisted();
        }

        if self.config().identity_map {
            repository.identity_map(self.model().name())?.delete(&key)?;
        }

        event!(Level::DEBUG, model = %self.model().name(), key = ?key, "resource destroyed");
        Ok(true)
    }

    /// Re-fetches every loaded attribute, then reloads every parent and
    /// child association. No-op on a new resource.
    pub async fn reload(&self) -> Result<()> {
        let names: Vec<String> = {
            let state = self.read_state()?;
            if state.identity.is_new() {
                return Ok(());
            }
            state.attributes.values().keys().cloned().collect()
        };
        self.reload_attributes(&names).await
    }

    /// Re-fetches the named attributes, then reloads every parent and child
    /// association. No-op on a new resource.
    pub async fn reload_attributes<S: AsRef<str>>(&self, names: &[S]) -> Result<()> {
        let Some(_running) = RunOnce::enter(&self.inner.reloading) else {
            return Ok(());
        };
        if self.is_new()? {
            return Ok(());
        }

        let properties = self.properties()?;
        let mut fields: Vec<String> = properties.key().iter().map(|p| p.name().to_string()).collect();
        for name in names {
            let name = name.as_ref();
            if !properties.contains(name) {
                return Err(DbError::UnknownAttribute(
                    name.to_string(),
                    self.model().name().to_string(),
                ));
            }
            if !fields.iter().any(|field| field == name) {
                fields.push(name.to_string());
            }
        }

        self.fetch(fields).await?;

        if !self.config().cascade {
            return Ok(());
        }

        let mut first_error = None;
        let related = self.parents()?.into_iter().chain(self.children()?);
        for association in related {
            if let Err(err) = association.reload().await {
                warn!(
                    "association reload failed: model='{}' error='{}'",
                    self.model().name(),
                    err
                );
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Loads the lazy-load context of `name`, skipping what is already
    /// materialized.
    pub(super) async fn lazy_load(&self, name: &str) -> Result<()> {
        let properties = self.properties()?;
        let fields: Vec<String> = {
            let state = self.read_state()?;
            if state.identity.is_new() || state.attributes.is_loaded(name) {
                return Ok(());
            }
            properties
                .lazy_load_context(name)
                .iter()
                .filter(|property| !state.attributes.is_loaded(property.name()))
                .map(|property| property.name().to_string())
                .collect()
        };

        if fields.is_empty() {
            return Ok(());
        }

        event!(Level::TRACE, model = %self.model().name(), fields = ?fields, "lazy load");
        self.fetch(fields).await
    }

    /// Reads `fields` of the stored row and materializes them as both value
    /// and original.
    async fn fetch(&self, fields: Vec<String>) -> Result<()> {
        let key = self.key()?;
        let query = self.query_for_key(&key)?.with_fields(fields);
        let repository = self.repository()?;

        let rows = repository.read(&query).await?;
        let Some(row) = rows.into_iter().next() else {
            warn!(
                "stored row not found: model='{}' key={:?}",
                self.model().name(),
                key
            );
            return Ok(());
        };

        let properties = self.properties()?;
        let record: Record = row
            .into_iter()
            .filter_map(|(name, value)| {
                let property = properties.get(&name)?;
                Some((name, property.typecast(&value)))
            })
            .collect();

        self.write_state()?.attributes.load(record);
        Ok(())
    }

    fn query_for_key(&self, key: &Key) -> Result<Query> {
        let repository = self.repository()?;
        let model = self.model();
        Query::new(repository.name(), model.name(), model.storage_name()).for_key(
            &model.key(repository.name()),
            key,
            Vec::new(),
        )
    }
}
