// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message router: address resolution and mailbox delivery.
//!
//! Concrete `rig/name` addresses deliver directly. Wildcards, roles, and
//! named lists resolve through the registry; queues and channels deliver
//! into their own shared mailboxes. Every successful delivery appends
//! exactly once per recipient and fires `mail-received` best-effort.

use crate::hooks::{HookContext, HookEngine, HookEvent};
use gaffer_core::{Address, Error, Message, MessageId, Result};
use gaffer_storage::MailboxStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// One agent known to the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredAgent {
    pub rig: String,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    /// Pool agent currently embodying this address, when one is live.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<gaffer_core::AgentId>,
}

impl RegisteredAgent {
    pub fn address(&self) -> String {
        format!("{}/{}", self.rig, self.name)
    }
}

/// Routing registry loaded from `<root>/registry.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterRegistry {
    #[serde(default)]
    pub agents: Vec<RegisteredAgent>,
    #[serde(default)]
    pub lists: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub queues: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
}

impl RouterRegistry {
    /// Load from disk; a missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self> {
        match gaffer_storage::atomic::read_json(path) {
            Ok(Some(registry)) => Ok(registry),
            Ok(None) => Ok(Self::default()),
            Err(e) => Err(gaffer_core::error::io_error("mail.RegistryIO", path, e)),
        }
    }

    fn suggest<'a>(&self, input: &str, names: impl Iterator<Item = &'a String>) -> Option<String> {
        let prefix: String = input.chars().take(3).collect();
        let candidates: Vec<&str> = names
            .filter(|n| n.starts_with(&prefix))
            .map(String::as_str)
            .collect();
        if candidates.is_empty() {
            None
        } else {
            Some(format!("did you mean: {}", candidates.join(", ")))
        }
    }
}

/// Receipt returned by a successful send.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub id: MessageId,
    pub recipients: Vec<String>,
}

/// Resolves addresses and delivers into mailboxes.
pub struct Router {
    mailboxes: MailboxStore,
    hooks: Arc<HookEngine>,
    registry: RouterRegistry,
}

impl Router {
    pub fn new(mailboxes: MailboxStore, hooks: Arc<HookEngine>, registry: RouterRegistry) -> Self {
        Self {
            mailboxes,
            hooks,
            registry,
        }
    }

    pub fn registry(&self) -> &RouterRegistry {
        &self.registry
    }

    /// Resolve an address string to concrete mailbox addresses.
    pub fn resolve(&self, raw: &str) -> Result<Vec<String>> {
        let address: Address = raw.parse()?;
        match address {
            Address::Agent { rig, name } => Ok(vec![format!("{}/{}", rig, name)]),
            Address::AnyRig { name } => self.matching(raw, |a| a.name == name),
            Address::AllInRig { rig } => self.matching(raw, |a| a.rig == rig),
            Address::Role(role) => self.matching(raw, |a| a.role.as_deref() == Some(&role)),
            Address::List(name) => match self.registry.lists.get(&name) {
                Some(members) if members.is_empty() => Err(empty_group(raw)),
                Some(members) => Ok(members.clone()),
                None => {
                    let mut err = Error::user("mail.UnknownList", "no such mailing list")
                        .with_context("list", &name)
                        .with_hint("list available via the router registry");
                    if let Some(suggestion) =
                        self.registry.suggest(&name, self.registry.lists.keys())
                    {
                        err = err.with_context("suggestion", suggestion);
                    }
                    Err(err)
                }
            },
            Address::Queue(name) => {
                if self.registry.queues.contains(&name) {
                    Ok(vec![format!("queue:{}", name)])
                } else {
                    Err(unknown_named("mail.UnknownQueue", "queue", &name, raw))
                }
            }
            Address::Channel(name) => {
                if self.registry.channels.contains(&name) {
                    Ok(vec![format!("channel:{}", name)])
                } else {
                    Err(unknown_named("mail.UnknownChannel", "channel", &name, raw))
                }
            }
        }
    }

    /// Validate routing, resolve recipients, and append to each mailbox.
    ///
    /// Exactly one of `to`/`queue`/`channel` must be set. A failed send
    /// appends nothing (validation and resolution precede any append).
    pub async fn send(&self, message: &Message) -> Result<SendReceipt> {
        if message.routing_count() != 1 {
            return Err(Error::user(
                "mail.InvalidRouting",
                "exactly one of to, queue, channel must be set",
            )
            .with_context("message", &message.id)
            .with_hint("set a single destination field"));
        }

        let raw = message
            .to
            .clone()
            .or_else(|| message.queue.as_ref().map(|q| format!("queue:{}", q)))
            .or_else(|| message.channel.as_ref().map(|c| format!("channel:{}", c)))
            .unwrap_or_default();

        let recipients = self.resolve(&raw)?;
        for recipient in &recipients {
            self.mailboxes.append(recipient, message)?;

            let ctx = HookContext::new(HookEvent::MailReceived, ".")
                .with_meta("recipient", recipient)
                .with_meta("message_id", &message.id)
                .with_meta("from", &message.from)
                .with_meta("subject", &message.subject);
            let _ = self.hooks.fire(&ctx).await;
        }

        tracing::info!(
            message = %message.id,
            recipients = recipients.len(),
            "delivered"
        );
        Ok(SendReceipt {
            id: message.id.clone(),
            recipients,
        })
    }

    /// All messages in one mailbox.
    pub fn inbox(&self, address: &str) -> Result<Vec<Message>> {
        self.mailboxes.read_all(address)
    }

    /// Filtered view of one mailbox. Filters are literal substrings.
    pub fn list(&self, address: &str, filter: Option<&str>) -> Result<Vec<Message>> {
        self.mailboxes.list(address, filter)
    }

    /// Find a message by ID across all mailboxes.
    pub fn show(&self, id: &MessageId) -> Result<Message> {
        self.mailboxes.find(id).map(|(_, message)| message)
    }

    /// Mark a message closed wherever it lives.
    pub fn close(&self, id: &MessageId) -> Result<()> {
        let (address, _) = self.mailboxes.find(id)?;
        self.mailboxes.close(&address, id)
    }

    fn matching(&self, raw: &str, pred: impl Fn(&RegisteredAgent) -> bool) -> Result<Vec<String>> {
        let matched: Vec<String> = self
            .registry
            .agents
            .iter()
            .filter(|a| pred(a))
            .map(RegisteredAgent::address)
            .collect();
        if matched.is_empty() {
            return Err(empty_group(raw));
        }
        Ok(matched)
    }
}

fn empty_group(raw: &str) -> Error {
    Error::permanent("group.Empty", "address resolves to no recipients")
        .with_context("address", raw)
}

fn unknown_named(code: &str, kind: &str, name: &str, raw: &str) -> Error {
    Error::user(code, format!("no such {}", kind))
        .with_context(kind, name)
        .with_context("address", raw)
        .with_hint("list available via the router registry")
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
