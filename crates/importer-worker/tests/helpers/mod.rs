//! Test helpers for importer worker integration tests
//!
//! In-memory stand-ins for every collaborator of the importer tasker:
//! - object store with call recording
//! - member directory / member store
//! - audit recorder
//! - notification queue
//!
//! Each fake can be switched into a failing mode to exercise error paths.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use importer_common::checksum::quote_integrity_tag;
use importer_common::MailJob;
use importer_worker::audit::{AuditRecorder, CreateAuditEntry};
use importer_worker::members::{
    Member, MemberDirectory, MemberStore, MemberUpdate, NewMember, ADMIN_ROLE, GENERAL_MEMBER_ROLE,
};
use importer_worker::notify::{DispatchMode, NotificationDispatcher, NotificationQueue};
use importer_worker::storage::{ObjectStore, StorageError, StoredObject};
use importer_common::ImportCategory;
use importer_worker::decode::Row;
use importer_worker::error::FileResult;
use importer_worker::strategy::{ImportStrategy, ImportSummary, MemberImportStrategy, StrategyRegistry};
use importer_worker::ImporterTasker;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub mod xlsx;

pub const CSV: &str = "text/csv";

// ============================================================================
// Object store
// ============================================================================

#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    gets: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
    pub fail_deletes: AtomicBool,
}

impl InMemoryObjectStore {
    /// Store an object whose integrity tag is `checksum` in S3 quoting
    pub fn put(&self, key: &str, content_type: Option<&str>, checksum: &str, body: &[u8]) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                key: key.to_string(),
                content_type: content_type.map(str::to_string),
                e_tag: Some(quote_integrity_tag(checksum)),
                body: body.to_vec(),
            },
        );
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn gets(&self) -> Vec<String> {
        self.gets.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        self.gets.lock().unwrap().push(key.to_string());
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.deletes.lock().unwrap().push(key.to_string());
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::backend(key, "access denied"));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

// ============================================================================
// Members
// ============================================================================

#[derive(Default)]
pub struct InMemoryMembers {
    members: Mutex<Vec<Member>>,
    next_id: AtomicUsize,
    pub fail_directory: AtomicBool,
    pub fail_store: AtomicBool,
    insert_budget: Mutex<Option<usize>>,
}

impl InMemoryMembers {
    pub fn add(&self, id: &str, app_id: &str, email: Option<&str>, role: &str) -> Member {
        let member = Member {
            id: id.to_string(),
            app_id: app_id.to_string(),
            email: email.map(str::to_string),
            username: id.to_string(),
            name: id.to_string(),
            phone: None,
            role: role.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.members.lock().unwrap().push(member.clone());
        member
    }

    /// Let the next `count` inserts succeed and fail every one after
    pub fn fail_inserts_after(&self, count: usize) {
        *self.insert_budget.lock().unwrap() = Some(count);
    }

    pub fn add_admin(&self, id: &str, app_id: &str, email: &str) -> Member {
        self.add(id, app_id, Some(email), ADMIN_ROLE)
    }

    pub fn by_email(&self, app_id: &str, email: &str) -> Option<Member> {
        self.members
            .lock()
            .unwrap()
            .iter()
            .find(|m| {
                m.app_id == app_id
                    && m.email
                        .as_deref()
                        .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .cloned()
    }

    pub fn count(&self, app_id: &str) -> usize {
        self.members
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.app_id == app_id)
            .count()
    }
}

#[async_trait]
impl MemberDirectory for InMemoryMembers {
    async fn find_member(&self, app_id: &str, member_id: &str) -> anyhow::Result<Option<Member>> {
        if self.fail_directory.load(Ordering::SeqCst) {
            anyhow::bail!("directory unavailable");
        }
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.app_id == app_id && m.id == member_id)
            .cloned())
    }

    async fn find_by_role(&self, app_id: &str, role: &str) -> anyhow::Result<Vec<Member>> {
        if self.fail_directory.load(Ordering::SeqCst) {
            anyhow::bail!("directory unavailable");
        }
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.app_id == app_id && m.role == role)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MemberStore for InMemoryMembers {
    async fn find_by_email(&self, app_id: &str, email: &str) -> anyhow::Result<Option<Member>> {
        if self.fail_store.load(Ordering::SeqCst) {
            anyhow::bail!("connection reset by peer");
        }
        Ok(self.by_email(app_id, email))
    }

    async fn insert_member(&self, member: NewMember) -> anyhow::Result<Member> {
        if let Some(budget) = self.insert_budget.lock().unwrap().as_mut() {
            if *budget == 0 {
                anyhow::bail!("connection reset by peer");
            }
            *budget -= 1;
        }
        let id = format!("m{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let record = Member {
            id,
            app_id: member.app_id,
            email: Some(member.email),
            username: member.username,
            name: member.name,
            phone: member.phone,
            role: member.role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.members.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn update_member(&self, member_id: &str, update: MemberUpdate) -> anyhow::Result<()> {
        let mut members = self.members.lock().unwrap();
        let member = members
            .iter_mut()
            .find(|m| m.id == member_id)
            .ok_or_else(|| anyhow::anyhow!("no member {}", member_id))?;

        if let Some(name) = update.name {
            member.name = name;
        }
        if let Some(phone) = update.phone {
            member.phone = Some(phone);
        }
        member.updated_at = Utc::now();
        Ok(())
    }
}

// ============================================================================
// Audit / notifications
// ============================================================================

#[derive(Default)]
pub struct RecordingAuditRecorder {
    entries: Mutex<Vec<CreateAuditEntry>>,
    pub fail: AtomicBool,
}

impl RecordingAuditRecorder {
    pub fn entries(&self) -> Vec<CreateAuditEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditRecorder for RecordingAuditRecorder {
    async fn record(&self, entry: CreateAuditEntry) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("audit table locked");
        }
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingQueue {
    sent: Mutex<Vec<MailJob>>,
    pub fail: AtomicBool,
}

impl RecordingQueue {
    pub fn sent(&self) -> Vec<MailJob> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationQueue for RecordingQueue {
    async fn enqueue(&self, mail: MailJob) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("mailer queue unavailable");
        }
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

/// JSON outcome mapping carried in a notification body
pub fn mail_body(mail: &MailJob) -> serde_json::Value {
    let start = mail.content.find('{').unwrap();
    let end = mail.content.rfind('}').unwrap();
    serde_json::from_str(&mail.content[start..=end]).unwrap()
}

// ============================================================================
// Strategies
// ============================================================================

/// Row e-mail that makes [`PanickingMemberStrategy`] panic
pub const PANIC_EMAIL: &str = "boom@example.com";

/// Member strategy that panics on a file containing [`PANIC_EMAIL`]
pub struct PanickingMemberStrategy {
    inner: MemberImportStrategy,
}

#[async_trait]
impl ImportStrategy for PanickingMemberStrategy {
    fn category(&self) -> ImportCategory {
        ImportCategory::Member
    }

    async fn import(&self, app_id: &str, rows: Vec<Row>) -> FileResult<ImportSummary> {
        if rows.iter().any(|row| row.get("email") == Some(PANIC_EMAIL)) {
            panic!("member strategy blew up");
        }
        self.inner.import(app_id, rows).await
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Importer tasker wired to in-memory collaborators
pub struct Harness {
    pub objects: Arc<InMemoryObjectStore>,
    pub members: Arc<InMemoryMembers>,
    pub audit: Arc<RecordingAuditRecorder>,
    pub queue: Arc<RecordingQueue>,
}

impl Harness {
    /// Tenant `t1` with invoker `u1` and one admin
    pub fn new() -> Self {
        let harness = Self {
            objects: Arc::new(InMemoryObjectStore::default()),
            members: Arc::new(InMemoryMembers::default()),
            audit: Arc::new(RecordingAuditRecorder::default()),
            queue: Arc::new(RecordingQueue::default()),
        };

        harness
            .members
            .add("u1", "t1", Some("u1@example.com"), GENERAL_MEMBER_ROLE);
        harness.members.add_admin("a1", "t1", "admin@example.com");
        harness.members.add_admin("a9", "t2", "other-tenant@example.com");
        harness
    }

    pub fn tasker(&self) -> ImporterTasker {
        self.tasker_with_mode(DispatchMode::AwaitAck)
    }

    pub fn tasker_with_mode(&self, mode: DispatchMode) -> ImporterTasker {
        self.tasker_with(
            Arc::new(MemberImportStrategy::new(self.members.clone())),
            mode,
        )
    }

    /// Tasker whose member strategy panics on [`PANIC_EMAIL`] rows
    pub fn panicking_tasker(&self) -> ImporterTasker {
        let strategy = PanickingMemberStrategy {
            inner: MemberImportStrategy::new(self.members.clone()),
        };
        self.tasker_with(Arc::new(strategy), DispatchMode::AwaitAck)
    }

    fn tasker_with(&self, strategy: Arc<dyn ImportStrategy>, mode: DispatchMode) -> ImporterTasker {
        let strategies = StrategyRegistry::new().with(strategy);

        ImporterTasker::new(
            self.objects.clone(),
            self.members.clone(),
            strategies,
            self.audit.clone(),
            NotificationDispatcher::new(self.queue.clone(), mode),
        )
    }
}
