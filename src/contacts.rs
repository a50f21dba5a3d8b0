//! Contact directory cache.
//!
//! Holds the authoritative list of contacts loaded from the remote store.
//! Reconciliation reads it; contact edits go through it so the remote store,
//! the in-memory list and the `contacts` session entry move together.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{Contact, ContactDraft, ContactId, ContactPatch, ContactSnapshot, RawContact};
use crate::remote::RemoteStore;
use crate::session::SessionCache;

pub struct ContactDirectory {
    remote: Arc<dyn RemoteStore>,
    cache: SessionCache,
    contacts: Vec<Contact>,
}

impl ContactDirectory {
    pub fn new(remote: Arc<dyn RemoteStore>, cache: SessionCache) -> Self {
        Self {
            remote,
            cache,
            contacts: Vec::new(),
        }
    }

    /// Contacts sorted by name.
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn get(&self, id: ContactId) -> Option<&Contact> {
        self.contacts.iter().find(|contact| contact.id == id)
    }

    pub fn snapshot(&self, id: ContactId) -> Result<ContactSnapshot> {
        self.get(id)
            .map(Contact::snapshot)
            .ok_or(Error::ContactNotFound(id))
    }

    /// Fetch the full directory and replace the in-memory list.
    ///
    /// On failure the previous list is kept.
    pub async fn load(&mut self) -> Result<usize> {
        let records = self.remote.fetch_contacts().await?;
        let contacts = normalize_contacts(records);
        self.commit(contacts)?;
        info!(count = self.contacts.len(), "contact directory loaded");
        Ok(self.contacts.len())
    }

    /// Load the directory if it holds nothing yet.
    pub async fn ensure_loaded(&mut self) -> Result<()> {
        if self.contacts.is_empty() {
            debug!("contact directory empty, fetching");
            self.load().await?;
        }
        Ok(())
    }

    /// Rebuild from the `contacts` session entry; false when there is none.
    pub fn restore_from_cache(&mut self) -> Result<bool> {
        match self.cache.cached_contacts()? {
            Some(mut contacts) => {
                sort_contacts(&mut contacts);
                self.contacts = contacts;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn create(&mut self, draft: ContactDraft) -> Result<Contact> {
        draft.validate()?;
        let raw = self.remote.create_contact(&draft).await?;
        let contact = raw.normalize()?;
        let mut next = self.contacts.clone();
        next.push(contact.clone());
        self.commit(next)?;
        info!(id = %contact.id, "contact created");
        Ok(contact)
    }

    /// Persist a partial update. A rename carries fresh initials.
    pub async fn patch(&mut self, id: ContactId, mut patch: ContactPatch) -> Result<Contact> {
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(Error::InvalidArgument(
                    "contact name cannot be empty".to_string(),
                ));
            }
            if patch.first_letters.is_none() {
                patch.first_letters = Some(crate::model::first_letters(name));
            }
        }

        let index = self.index_of(id)?;
        let mut updated = self.contacts[index].clone();
        patch.apply(&mut updated);

        self.remote.patch_contact(id, &patch).await?;

        let mut next = self.contacts.clone();
        next[index] = updated.clone();
        self.commit(next)?;
        info!(id = %id, "contact updated");
        Ok(updated)
    }

    pub async fn remove(&mut self, id: ContactId) -> Result<Contact> {
        let index = self.index_of(id)?;
        self.remote.delete_contact(id).await?;

        let mut next = self.contacts.clone();
        let removed = next.remove(index);
        self.commit(next)?;
        info!(id = %id, "contact removed");
        Ok(removed)
    }

    fn index_of(&self, id: ContactId) -> Result<usize> {
        self.contacts
            .iter()
            .position(|contact| contact.id == id)
            .ok_or(Error::ContactNotFound(id))
    }

    fn commit(&mut self, mut contacts: Vec<Contact>) -> Result<()> {
        sort_contacts(&mut contacts);
        self.cache.store_contacts(&contacts)?;
        self.contacts = contacts;
        Ok(())
    }
}

fn normalize_contacts(records: Vec<Value>) -> Vec<Contact> {
    records
        .into_iter()
        .filter_map(|value| match RawContact::from_value(value).and_then(RawContact::normalize) {
            Ok(contact) => Some(contact),
            Err(err) => {
                warn!(error = %err, "skipping contact record");
                None
            }
        })
        .collect()
}

fn sort_contacts(contacts: &mut [Contact]) {
    contacts.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MemoryRemote, RemoteOp};
    use serde_json::json;

    fn directory(remote: &Arc<MemoryRemote>) -> ContactDirectory {
        ContactDirectory::new(remote.clone(), SessionCache::in_memory())
    }

    #[tokio::test]
    async fn load_sorts_by_name_and_caches() {
        let remote = Arc::new(MemoryRemote::new());
        remote.seed_contact(json!({"name": "Zoe Park", "email": "zoe@example.com"}));
        remote.seed_contact(json!({"name": "adam Lee", "email": "adam@example.com"}));
        remote.seed_contact(json!({"email": "nameless@example.com"}));

        let cache = SessionCache::in_memory();
        let mut dir = ContactDirectory::new(remote.clone(), cache.clone());
        assert_eq!(dir.load().await.expect("load"), 2);
        let names: Vec<&str> = dir.contacts().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["adam Lee", "Zoe Park"]);
        assert_eq!(cache.cached_contacts().expect("cache").map(|c| c.len()), Some(2));
    }

    #[tokio::test]
    async fn ensure_loaded_fetches_once() {
        let remote = Arc::new(MemoryRemote::new());
        remote.seed_contact(json!({"name": "Ada", "email": "ada@example.com"}));
        let mut dir = directory(&remote);

        dir.ensure_loaded().await.expect("first");
        dir.ensure_loaded().await.expect("second");
        assert_eq!(remote.requests_of(RemoteOp::FetchContacts).len(), 1);
    }

    #[tokio::test]
    async fn rename_refreshes_initials() {
        let remote = Arc::new(MemoryRemote::new());
        let id = remote.seed_contact(json!({"name": "Ada Byron", "firstLetters": "AB"}));
        let mut dir = directory(&remote);
        dir.load().await.expect("load");

        let updated = dir
            .patch(
                id,
                ContactPatch {
                    name: Some("Ada Lovelace".to_string()),
                    ..ContactPatch::default()
                },
            )
            .await
            .expect("patch");
        assert_eq!(updated.first_letters, "AL");
        let record = remote.contact_record(id).expect("record");
        assert_eq!(record["firstLetters"], json!("AL"));
    }

    #[tokio::test]
    async fn failed_remove_keeps_contact() {
        let remote = Arc::new(MemoryRemote::new());
        let id = remote.seed_contact(json!({"name": "Kim"}));
        let mut dir = directory(&remote);
        dir.load().await.expect("load");

        remote.fail(RemoteOp::DeleteContact);
        assert!(dir.remove(id).await.unwrap_err().is_transport());
        assert!(dir.get(id).is_some());

        assert!(matches!(
            dir.remove(ContactId(42)).await,
            Err(Error::ContactNotFound(ContactId(42)))
        ));
    }
}
