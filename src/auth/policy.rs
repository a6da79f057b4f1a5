// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Permission Resolver
//!
//! Maps `(role, path, method)` to allow/deny using a declarative policy
//! document with two tables:
//!
//! ```text
//! routes: category -> template -> METHOD -> action
//! roles:  role -> action -> [METHOD]
//! ```
//!
//! ## Matching
//!
//! Paths are compared segment by segment. A template segment starting with
//! `:` matches any concrete segment, every other segment must be equal, and
//! the segment counts must agree. The first template with a matching method
//! names the action; the role table then decides.
//!
//! ## Authoring Constraint
//!
//! Templates must be disjoint. Two templates that could match the same path
//! with the same method are rejected when the policy is loaded, so the
//! resolver never has to pick between them.
//!
//! Unrestricted roles are expressed by granting every action in the role
//! table; the resolver has no special cases.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;

use super::roles::Role;

/// Policy compiled into the binary.
const EMBEDDED_POLICY: &str = include_str!("policy.json");

/// Template segment prefix marking a path parameter.
const PARAM_MARKER: char = ':';

/// Policy loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse policy: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("route template must start with '/': {0}")]
    InvalidTemplate(String),
    #[error("templates {first} and {second} overlap on {method}")]
    OverlappingTemplates {
        first: String,
        second: String,
        method: String,
    },
    #[error("role {role} references unknown action {action}")]
    UnknownAction { role: Role, action: String },
}

/// The policy document as authored.
#[derive(Debug, Clone, Deserialize)]
pub struct Policy {
    /// category -> template -> method -> action
    pub routes: BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>,
    /// role -> action -> methods
    pub roles: BTreeMap<Role, BTreeMap<String, Vec<String>>>,
}

impl Policy {
    /// Parse and validate a policy document.
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let policy: Policy = serde_json::from_str(json)?;
        policy.validate()?;
        Ok(policy)
    }

    /// The policy shipped with the binary.
    pub fn embedded() -> Result<Self, PolicyError> {
        Self::from_json(EMBEDDED_POLICY)
    }

    /// Load from `path` when given, otherwise use the embedded policy.
    pub fn load(path: Option<&Path>) -> Result<Self, PolicyError> {
        match path {
            Some(path) => {
                let json = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                Self::from_json(&json)
            }
            None => Self::embedded(),
        }
    }

    /// Check template syntax, template disjointness and action references.
    pub fn validate(&self) -> Result<(), PolicyError> {
        let routes = compile_routes(self)?;

        for (i, a) in routes.iter().enumerate() {
            for b in &routes[i + 1..] {
                if !a.overlaps(b) {
                    continue;
                }
                if let Some(method) = a.actions.keys().find(|m| b.actions.contains_key(*m)) {
                    return Err(PolicyError::OverlappingTemplates {
                        first: a.template.clone(),
                        second: b.template.clone(),
                        method: method.clone(),
                    });
                }
            }
        }

        let known: HashSet<&str> = routes
            .iter()
            .flat_map(|r| r.actions.values().map(String::as_str))
            .collect();
        for (role, actions) in &self.roles {
            if let Some(action) = actions.keys().find(|a| !known.contains(a.as_str())) {
                return Err(PolicyError::UnknownAction {
                    role: *role,
                    action: action.clone(),
                });
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Param,
    Literal(String),
}

#[derive(Debug, Clone)]
struct CompiledRoute {
    template: String,
    segments: Vec<Segment>,
    /// METHOD -> action
    actions: HashMap<String, String>,
}

impl CompiledRoute {
    fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').collect();
        parts.len() == self.segments.len()
            && self.segments.iter().zip(parts).all(|(segment, part)| match segment {
                Segment::Param => true,
                Segment::Literal(literal) => literal == part,
            })
    }

    /// Whether some concrete path could match both templates.
    fn overlaps(&self, other: &CompiledRoute) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    _ => true,
                })
    }
}

fn compile_routes(policy: &Policy) -> Result<Vec<CompiledRoute>, PolicyError> {
    let mut compiled = Vec::new();
    for templates in policy.routes.values() {
        for (template, methods) in templates {
            if !template.starts_with('/') {
                return Err(PolicyError::InvalidTemplate(template.clone()));
            }
            let segments = template
                .split('/')
                .map(|s| {
                    if s.starts_with(PARAM_MARKER) {
                        Segment::Param
                    } else {
                        Segment::Literal(s.to_string())
                    }
                })
                .collect();
            let actions = methods
                .iter()
                .map(|(method, action)| (method.to_ascii_uppercase(), action.clone()))
                .collect();
            compiled.push(CompiledRoute {
                template: template.clone(),
                segments,
                actions,
            });
        }
    }
    Ok(compiled)
}

/// Answers `has_permission` queries against a loaded policy.
///
/// Immutable after construction; lookups from many requests need no locking.
#[derive(Debug, Clone)]
pub struct PermissionResolver {
    routes: Vec<CompiledRoute>,
    /// role -> action -> METHODs
    grants: HashMap<Role, HashMap<String, HashSet<String>>>,
}

impl PermissionResolver {
    pub fn new(policy: &Policy) -> Result<Self, PolicyError> {
        policy.validate()?;
        let routes = compile_routes(policy)?;
        let grants = policy
            .roles
            .iter()
            .map(|(role, actions)| {
                let actions = actions
                    .iter()
                    .map(|(action, methods)| {
                        let methods = methods.iter().map(|m| m.to_ascii_uppercase()).collect();
                        (action.clone(), methods)
                    })
                    .collect();
                (*role, actions)
            })
            .collect();
        Ok(Self { routes, grants })
    }

    /// Named action for a concrete path and method, if any template matches.
    pub fn resolve_action(&self, path: &str, method: &str) -> Option<&str> {
        let method = method.to_ascii_uppercase();
        self.routes
            .iter()
            .filter(|route| route.matches(path))
            .find_map(|route| route.actions.get(&method))
            .map(String::as_str)
    }

    /// Whether `role` may call `method` on `path`.
    pub fn has_permission(&self, role: Role, path: &str, method: &str) -> bool {
        let Some(action) = self.resolve_action(path, method) else {
            return false;
        };
        let method = method.to_ascii_uppercase();
        self.grants
            .get(&role)
            .and_then(|actions| actions.get(action))
            .is_some_and(|methods| methods.contains(&method))
    }
}
