//! Member import: one tenant member per row, keyed by e-mail

use async_trait::async_trait;
use importer_common::ImportCategory;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{ImportStrategy, ImportSummary};
use crate::decode::Row;
use crate::error::{FileError, FileResult};
use crate::members::{Member, MemberStore, MemberUpdate, NewMember, GENERAL_MEMBER_ROLE};

const EMAIL_COLUMNS: &[&str] = &["email", "e-mail", "mail"];
const USERNAME_COLUMNS: &[&str] = &["username", "account"];
const NAME_COLUMNS: &[&str] = &["name", "full name"];
const PHONE_COLUMNS: &[&str] = &["phone", "mobile", "phone number"];

/// Header names backing each member field
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct MemberColumns {
    email: Option<String>,
    username: Option<String>,
    name: Option<String>,
    phone: Option<String>,
}

impl MemberColumns {
    fn resolve(row: &Row) -> Self {
        let find = |aliases: &[&str]| {
            row.headers()
                .find(|h| {
                    let h = h.trim().to_lowercase();
                    aliases.iter().any(|alias| *alias == h)
                })
                .map(str::to_string)
        };

        Self {
            email: find(EMAIL_COLUMNS),
            username: find(USERNAME_COLUMNS),
            name: find(NAME_COLUMNS),
            phone: find(PHONE_COLUMNS),
        }
    }
}

/// A validated row
#[derive(Debug, Clone, PartialEq, Eq)]
struct MemberRow {
    email: String,
    username: String,
    name: String,
    /// Name as given in the file, empty when defaulted
    explicit_name: Option<String>,
    phone: Option<String>,
}

impl MemberRow {
    fn parse(row: &Row, columns: &MemberColumns) -> Result<Self, String> {
        let cell = |column: &Option<String>| {
            column
                .as_deref()
                .and_then(|c| row.get(c))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let email = cell(&columns.email)
            .map(|e| e.to_lowercase())
            .ok_or_else(|| "missing email".to_string())?;
        let local_part = email_local_part(&email)
            .ok_or_else(|| format!("invalid email '{}'", email))?
            .to_string();

        let username = cell(&columns.username).unwrap_or(local_part);
        let explicit_name = cell(&columns.name);
        let name = explicit_name.clone().unwrap_or_else(|| username.clone());

        Ok(Self {
            email,
            username,
            name,
            explicit_name,
            phone: cell(&columns.phone),
        })
    }

    /// Changes to apply to an existing member, if any
    fn changes_for(&self, existing: &Member) -> MemberUpdate {
        MemberUpdate {
            name: self
                .explicit_name
                .clone()
                .filter(|name| *name != existing.name),
            phone: self
                .phone
                .clone()
                .filter(|phone| existing.phone.as_deref() != Some(phone.as_str())),
        }
    }
}

/// Local part of a `local@domain` address whose domain contains a dot
fn email_local_part(email: &str) -> Option<&str> {
    if email.chars().any(char::is_whitespace) {
        return None;
    }

    let (local, domain) = email.split_once('@')?;
    let valid = !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.');

    valid.then_some(local)
}

pub struct MemberImportStrategy {
    store: Arc<dyn MemberStore>,
}

impl MemberImportStrategy {
    pub fn new(store: Arc<dyn MemberStore>) -> Self {
        Self { store }
    }

    async fn upsert(&self, app_id: &str, member: MemberRow, summary: &mut ImportSummary) -> FileResult<()> {
        let existing = self
            .store
            .find_by_email(app_id, &member.email)
            .await
            .map_err(|e| FileError::store(format!("{:#}", e)))?;

        match existing {
            Some(existing) => {
                let update = member.changes_for(&existing);
                if update.is_empty() {
                    summary.record_skipped();
                    return Ok(());
                }

                self.store
                    .update_member(&existing.id, update)
                    .await
                    .map_err(|e| FileError::store(format!("{:#}", e)))?;
                summary.record_updated();
            },
            None => {
                self.store
                    .insert_member(NewMember {
                        app_id: app_id.to_string(),
                        email: member.email,
                        username: member.username,
                        name: member.name,
                        phone: member.phone,
                        role: GENERAL_MEMBER_ROLE.to_string(),
                    })
                    .await
                    .map_err(|e| FileError::store(format!("{:#}", e)))?;
                summary.record_created();
            },
        }

        Ok(())
    }
}

#[async_trait]
impl ImportStrategy for MemberImportStrategy {
    fn category(&self) -> ImportCategory {
        ImportCategory::Member
    }

    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn import(&self, app_id: &str, rows: Vec<Row>) -> FileResult<ImportSummary> {
        let mut summary = ImportSummary::default();
        let Some(first) = rows.first() else {
            return Ok(summary);
        };

        let columns = MemberColumns::resolve(first);
        if columns.email.is_none() {
            return Err(FileError::validation(format!(
                "no email column; expected one of: {}",
                EMAIL_COLUMNS.join(", ")
            )));
        }
        debug!(?columns, "Resolved member columns");

        let mut seen = HashSet::new();
        for row in &rows {
            let member = match MemberRow::parse(row, &columns) {
                Ok(member) => member,
                Err(reason) => {
                    debug!(line = row.line, %reason, "Rejected member row");
                    summary.reject(row.line, reason);
                    continue;
                },
            };

            if !seen.insert(member.email.clone()) {
                summary.record_skipped();
                continue;
            }

            if let Err(err) = self.upsert(app_id, member, &mut summary).await {
                warn!(line = row.line, error = %err, "Member store failed; aborting file");
                return Err(err.with_partial(summary));
            }
        }

        info!(
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            failed = summary.failed,
            "Member import finished"
        );

        if summary.has_rejections() {
            warn!(failed = summary.failed, "Member import rejected rows");
            return Err(FileError::DomainValidation {
                message: format!("{} of {} rows rejected", summary.failed, rows.len()),
                partial: Some(summary),
            });
        }

        Ok(summary)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(line: usize, cells: &[(&str, &str)]) -> Row {
        Row::new(
            line,
            cells
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn member(name: &str, phone: Option<&str>) -> Member {
        Member {
            id: "m1".to_string(),
            app_id: "t1".to_string(),
            email: Some("a@example.com".to_string()),
            username: "a".to_string(),
            name: name.to_string(),
            phone: phone.map(str::to_string),
            role: GENERAL_MEMBER_ROLE.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_email_local_part() {
        assert_eq!(email_local_part("alice@example.com"), Some("alice"));
        assert_eq!(email_local_part("alice@localhost"), None);
        assert_eq!(email_local_part("@example.com"), None);
        assert_eq!(email_local_part("a@b@example.com"), None);
        assert_eq!(email_local_part("a b@example.com"), None);
        assert_eq!(email_local_part("alice@example."), None);
    }

    #[test]
    fn test_columns_resolve_aliases() {
        let columns = MemberColumns::resolve(&row(
            2,
            &[("E-Mail", ""), ("Account", ""), ("Full Name", ""), ("Mobile", "")],
        ));
        assert_eq!(columns.email.as_deref(), Some("E-Mail"));
        assert_eq!(columns.username.as_deref(), Some("Account"));
        assert_eq!(columns.name.as_deref(), Some("Full Name"));
        assert_eq!(columns.phone.as_deref(), Some("Mobile"));
    }

    #[test]
    fn test_parse_defaults() {
        let r = row(2, &[("email", " Alice@Example.COM "), ("phone", "")]);
        let columns = MemberColumns::resolve(&r);
        let parsed = MemberRow::parse(&r, &columns).unwrap();

        assert_eq!(parsed.email, "alice@example.com");
        assert_eq!(parsed.username, "alice");
        assert_eq!(parsed.name, "alice");
        assert_eq!(parsed.explicit_name, None);
        assert_eq!(parsed.phone, None);
    }

    #[test]
    fn test_parse_rejects() {
        let r = row(3, &[("email", "")]);
        let columns = MemberColumns::resolve(&r);
        assert_eq!(MemberRow::parse(&r, &columns).unwrap_err(), "missing email");

        let r = row(4, &[("email", "not-an-email")]);
        assert!(MemberRow::parse(&r, &columns).unwrap_err().contains("invalid email"));
    }

    #[test]
    fn test_changes_for_existing() {
        let r = row(2, &[("email", "a@example.com"), ("name", "Alice"), ("phone", "0912")]);
        let parsed = MemberRow::parse(&r, &MemberColumns::resolve(&r)).unwrap();

        assert!(parsed.changes_for(&member("Alice", Some("0912"))).is_empty());

        let update = parsed.changes_for(&member("Old Name", Some("0912")));
        assert_eq!(update.name.as_deref(), Some("Alice"));
        assert_eq!(update.phone, None);
    }

    #[test]
    fn test_defaulted_name_never_overwrites() {
        let r = row(2, &[("email", "a@example.com")]);
        let parsed = MemberRow::parse(&r, &MemberColumns::resolve(&r)).unwrap();
        assert!(parsed.changes_for(&member("Alice", None)).is_empty());
    }
}
