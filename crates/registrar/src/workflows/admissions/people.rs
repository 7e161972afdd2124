use std::sync::Arc;

use tracing::info;

use super::domain::{Person, PersonId};
use crate::clock::Clock;
use crate::store::{LockKey, Store};
use crate::workflows::WorkflowError;

/// Lower-cases and trims an address so lookups are case-insensitive.
pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Person lookups that never see soft-deleted rows.
pub struct PeopleDirectory {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
}

impl PeopleDirectory {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn register(
        &self,
        first_name: &str,
        last_name: &str,
        email: Option<&str>,
    ) -> Result<Person, WorkflowError> {
        let first_name = first_name.trim();
        if first_name.is_empty() {
            return Err(WorkflowError::bad_request("first name is required"));
        }

        let Some(email) = email.map(normalize_email) else {
            return Ok(self.insert(first_name, last_name.trim(), None));
        };
        if !email.contains('@') {
            return Err(WorkflowError::bad_request(format!(
                "'{email}' is not a valid e-mail address"
            )));
        }

        self.store
            .locks
            .with(LockKey::PersonEmail(email.clone()), || {
                if let Some(existing) = self.find_by_email(&email) {
                    return Err(WorkflowError::conflict(format!(
                        "person {} already uses {email}",
                        existing.id
                    )));
                }
                Ok(self.insert(first_name, last_name.trim(), Some(email.clone())))
            })
    }

    pub fn find_by_email(&self, email: &str) -> Option<Person> {
        let email = normalize_email(email);
        self.store
            .people
            .find(|person| person.is_live() && person.email.as_deref() == Some(email.as_str()))
    }

    pub fn find_or_fail(&self, id: &PersonId) -> Result<Person, WorkflowError> {
        self.store
            .people
            .get(id)
            .filter(Person::is_live)
            .ok_or_else(|| WorkflowError::not_found("person", id))
    }

    /// Stamps `deleted_at`; the row stays for the records that point at it.
    pub fn soft_delete(&self, id: &PersonId) -> Result<Person, WorkflowError> {
        let now = self.clock.now();
        self.store
            .people
            .update(id, |person| {
                if person.is_live() {
                    person.deleted_at = Some(now);
                    Some(person.clone())
                } else {
                    None
                }
            })
            .flatten()
            .inspect(|person| info!(person_id = %person.id, "person soft-deleted"))
            .ok_or_else(|| WorkflowError::not_found("person", id))
    }

    /// Matches an existing live person by e-mail or creates one from a free
    /// form full name. Date of birth and nationality stay unset until the
    /// applicant supplies them.
    pub(crate) fn find_or_create(&self, full_name: &str, email: &str) -> Person {
        let email = normalize_email(email);
        self.store
            .locks
            .with(LockKey::PersonEmail(email.clone()), || {
                if let Some(existing) = self.find_by_email(&email) {
                    return existing;
                }
                let (first_name, last_name) = split_name(full_name);
                self.insert(first_name, last_name, Some(email.clone()))
            })
    }

    fn insert(&self, first_name: &str, last_name: &str, email: Option<String>) -> Person {
        let person = Person {
            id: PersonId(self.store.people.next_key()),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email,
            date_of_birth: None,
            nationality: None,
            created_at: self.clock.now(),
            deleted_at: None,
        };
        self.store.people.insert(person.id.clone(), person.clone());
        person
    }
}

fn split_name(full_name: &str) -> (&str, &str) {
    let trimmed = full_name.trim();
    match trimmed.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (trimmed, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_name_keeps_compound_surnames() {
        assert_eq!(split_name("Alice van der Berg"), ("Alice", "van der Berg"));
        assert_eq!(split_name("  Cher "), ("Cher", ""));
    }

    #[test]
    fn emails_compare_case_insensitively() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }
}
