use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::access_store::{
    load_allow_list, load_pending_adds, load_pending_approvals, save_allow_list,
    save_pending_adds, save_pending_approvals, AllowListFile, PendingAddFile, PendingApproval,
    PendingApprovalFile,
};
use crate::directives::{normalize_handle, parse_admin_directive, AdminDirective};

#[derive(Debug, Clone)]
pub struct AccessGateConfig {
    pub admin_user_id: i64,
    pub allowlist_path: PathBuf,
    pub pending_add_path: PathBuf,
    pub pending_approvals_path: PathBuf,
    /// When false, pending approvals live only in memory and are lost on restart.
    pub persist_pending_approvals: bool,
}

/// Security state paths under `<state_dir>/security`.
pub fn access_gate_config_for_state_dir(
    state_dir: &Path,
    admin_user_id: i64,
    persist_pending_approvals: bool,
) -> AccessGateConfig {
    let security_dir = state_dir.join("security");
    AccessGateConfig {
        admin_user_id,
        allowlist_path: security_dir.join("allowlist.json"),
        pending_add_path: security_dir.join("pending-add.json"),
        pending_approvals_path: security_dir.join("pending-approvals.json"),
        persist_pending_approvals,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Identity fields taken from an inbound message envelope.
pub struct AccessRequester {
    pub user_id: i64,
    pub handle: Option<String>,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRole {
    Admin,
    AllowListed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Text the caller must deliver to `chat_id`.
pub struct AccessNotice {
    pub chat_id: i64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Sender may continue to command handling.
    Proceed { role: AccessRole },
    /// The gate consumed the message; deliver `notices` and stop.
    Handled {
        reason_code: &'static str,
        notices: Vec<AccessNotice>,
    },
}

impl AccessDecision {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Proceed {
                role: AccessRole::Admin,
            } => "allow_admin",
            Self::Proceed {
                role: AccessRole::AllowListed,
            } => "allow_allowlist",
            Self::Handled { reason_code, .. } => *reason_code,
        }
    }
}

const APPROVED: &str = "admin_approved_request";
const APPROVE_UNKNOWN: &str = "admin_approve_not_pending";
const ADD_RECORDED: &str = "admin_add_recorded";
const DIRECTIVE_USAGE: &str = "admin_directive_usage";
const INVITE_COMPLETED: &str = "invite_completed";
const DENY_NEW_REQUEST: &str = "deny_pending_approval_created";
const DENY_ALREADY_PENDING: &str = "deny_pending_approval_exists";

/// Allow-list gate in front of every command.
///
/// Resolution order per message: admin approval directive, admin add directive,
/// invite completion by handle, rejection of unknown senders, then proceed.
#[derive(Debug)]
pub struct AccessGate {
    config: AccessGateConfig,
    allow_list: AllowListFile,
    pending_adds: PendingAddFile,
    pending_approvals: PendingApprovalFile,
}

impl AccessGate {
    /// Loads persisted state. Pending approvals are only read back when they are
    /// configured to persist.
    pub fn open(config: AccessGateConfig) -> Result<Self> {
        let allow_list = load_allow_list(&config.allowlist_path)?;
        let pending_adds = load_pending_adds(&config.pending_add_path)?;
        let pending_approvals = if config.persist_pending_approvals {
            load_pending_approvals(&config.pending_approvals_path)?
        } else {
            PendingApprovalFile::default()
        };
        tracing::info!(
            allow_listed = allow_list.users.len(),
            pending_adds = pending_adds.handles.len(),
            pending_approvals = pending_approvals.requests.len(),
            "access gate loaded"
        );
        Ok(Self {
            config,
            allow_list,
            pending_adds,
            pending_approvals,
        })
    }

    pub fn admin_user_id(&self) -> i64 {
        self.config.admin_user_id
    }

    pub fn is_allow_listed(&self, user_id: i64) -> bool {
        self.allow_list.users.contains(&user_id)
    }

    pub fn pending_approval(&self, user_id: i64) -> Option<&PendingApproval> {
        self.pending_approvals.requests.get(&user_id)
    }

    pub fn has_pending_add(&self, handle: &str) -> bool {
        self.pending_adds
            .handles
            .contains_key(&normalize_handle(handle))
    }

    /// Runs one inbound message through the gate. `chat_id` is where replies to the
    /// sender go.
    pub fn evaluate(
        &mut self,
        requester: &AccessRequester,
        chat_id: i64,
        text: &str,
    ) -> AccessDecision {
        let admin_id = self.config.admin_user_id;
        let is_admin = requester.user_id == admin_id;

        if is_admin {
            match parse_admin_directive(text) {
                Some(AdminDirective::Approve { user_id }) => {
                    return self.approve(user_id, chat_id);
                }
                Some(AdminDirective::Add { handle }) => return self.record_add(handle, chat_id),
                Some(AdminDirective::Usage(usage)) => {
                    return AccessDecision::Handled {
                        reason_code: DIRECTIVE_USAGE,
                        notices: vec![AccessNotice {
                            chat_id,
                            text: usage.to_string(),
                        }],
                    };
                }
                None => {}
            }
        }

        if let Some(handle) = requester.handle.as_deref().map(normalize_handle) {
            if !handle.is_empty() && self.pending_adds.handles.contains_key(&handle) {
                return self.complete_invite(requester, &handle, chat_id);
            }
        }

        if is_admin {
            return AccessDecision::Proceed {
                role: AccessRole::Admin,
            };
        }
        if self.is_allow_listed(requester.user_id) {
            return AccessDecision::Proceed {
                role: AccessRole::AllowListed,
            };
        }
        self.reject_unknown(requester, chat_id)
    }

    fn approve(&mut self, user_id: i64, admin_chat_id: i64) -> AccessDecision {
        let Some(request) = self.pending_approvals.requests.remove(&user_id) else {
            return AccessDecision::Handled {
                reason_code: APPROVE_UNKNOWN,
                notices: vec![AccessNotice {
                    chat_id: admin_chat_id,
                    text: format!("No pending request for user {user_id}."),
                }],
            };
        };
        self.allow_list.users.insert(user_id);
        self.persist_allow_list();
        self.persist_pending_approvals();
        tracing::info!(user_id, "access request approved");

        AccessDecision::Handled {
            reason_code: APPROVED,
            notices: vec![
                AccessNotice {
                    chat_id: admin_chat_id,
                    text: format!("✅ Approved {}.", describe_request(user_id, &request)),
                },
                AccessNotice {
                    chat_id: user_id,
                    text: "✅ You have been approved. Send /help to see available commands."
                        .to_string(),
                },
            ],
        }
    }

    fn record_add(&mut self, handle: String, admin_chat_id: i64) -> AccessDecision {
        self.pending_adds.handles.insert(handle.clone(), true);
        self.persist_pending_adds();
        tracing::info!(handle = %handle, "invite recorded");
        AccessDecision::Handled {
            reason_code: ADD_RECORDED,
            notices: vec![AccessNotice {
                chat_id: admin_chat_id,
                text: format!(
                    "Added @{handle}. They get access as soon as they send this bot any message."
                ),
            }],
        }
    }

    fn complete_invite(
        &mut self,
        requester: &AccessRequester,
        handle: &str,
        chat_id: i64,
    ) -> AccessDecision {
        self.pending_adds.handles.remove(handle);
        self.persist_pending_adds();
        self.allow_list.users.insert(requester.user_id);
        self.persist_allow_list();
        if self
            .pending_approvals
            .requests
            .remove(&requester.user_id)
            .is_some()
        {
            self.persist_pending_approvals();
        }
        tracing::info!(user_id = requester.user_id, handle = %handle, "invite completed");

        AccessDecision::Handled {
            reason_code: INVITE_COMPLETED,
            notices: vec![
                AccessNotice {
                    chat_id,
                    text: "✅ Access granted. Send /help to see available commands.".to_string(),
                },
                AccessNotice {
                    chat_id: self.config.admin_user_id,
                    text: format!(
                        "@{handle} ({}, id {}) joined via invite.",
                        requester.display_name, requester.user_id
                    ),
                },
            ],
        }
    }

    fn reject_unknown(&mut self, requester: &AccessRequester, chat_id: i64) -> AccessDecision {
        let mut notices = Vec::new();
        let reason_code = if self
            .pending_approvals
            .requests
            .contains_key(&requester.user_id)
        {
            DENY_ALREADY_PENDING
        } else {
            let request = PendingApproval {
                display_name: requester.display_name.clone(),
                handle: requester.handle.clone().filter(|handle| !handle.is_empty()),
            };
            notices.push(AccessNotice {
                chat_id: self.config.admin_user_id,
                text: format!(
                    "🔐 Access request from {}. Reply \"yes {}\" to approve.",
                    describe_request(requester.user_id, &request),
                    requester.user_id
                ),
            });
            self.pending_approvals
                .requests
                .insert(requester.user_id, request);
            self.persist_pending_approvals();
            tracing::info!(user_id = requester.user_id, "access request recorded");
            DENY_NEW_REQUEST
        };
        notices.push(AccessNotice {
            chat_id,
            text: "⛔ You are not authorized to use this bot. The admin has been notified."
                .to_string(),
        });
        AccessDecision::Handled {
            reason_code,
            notices,
        }
    }

    fn persist_allow_list(&self) {
        if let Err(error) = save_allow_list(&self.config.allowlist_path, &self.allow_list) {
            tracing::warn!("failed to persist allow-list: {error:#}");
        }
    }

    fn persist_pending_adds(&self) {
        if let Err(error) = save_pending_adds(&self.config.pending_add_path, &self.pending_adds) {
            tracing::warn!("failed to persist pending invites: {error:#}");
        }
    }

    fn persist_pending_approvals(&self) {
        if !self.config.persist_pending_approvals {
            return;
        }
        if let Err(error) = save_pending_approvals(
            &self.config.pending_approvals_path,
            &self.pending_approvals,
        ) {
            tracing::warn!("failed to persist pending approvals: {error:#}");
        }
    }
}

fn describe_request(user_id: i64, request: &PendingApproval) -> String {
    match request.handle.as_deref() {
        Some(handle) => format!("{} (@{handle}, id {user_id})", request.display_name),
        None => format!("{} (id {user_id})", request.display_name),
    }
}
