//! Permission expressions and the checker contract used to evaluate them.

use std::fmt;
use std::sync::Arc;

/// Host-supplied predicate resolving atomic permission strings.
///
/// Invoked lazily from the per-node gate during walks; the engine never
/// caches the answer.
pub trait PermissionChecker<S>: Send + Sync {
    /// Returns whether `sender` holds the atomic permission `permission`.
    fn has_permission(&self, sender: &S, permission: &str) -> bool;
}

/// A checker that grants every atomic permission.
///
/// The default for dispatchers whose host has no permission back-end.
pub struct AllowAllChecker;

impl<S> PermissionChecker<S> for AllowAllChecker {
    fn has_permission(&self, _sender: &S, _permission: &str) -> bool {
        true
    }
}

type PredicateFn<S> = Arc<dyn Fn(&S) -> bool + Send + Sync>;

/// A permission expression attached to a command.
///
/// Expressions are trees of AND/OR/NOT over atomic permissions. Atoms are
/// resolved through the dispatcher's [`PermissionChecker`]; predicate atoms
/// run arbitrary host logic against the sender. Evaluation short-circuits
/// like the corresponding boolean operators.
pub enum Permission<S> {
    /// Always holds.
    Always,
    /// A named permission resolved by the host's checker.
    Atom(String),
    /// Arbitrary host logic over the sender.
    Predicate(PredicateFn<S>),
    /// Holds when any branch holds.
    AnyOf(Vec<Permission<S>>),
    /// Holds when every branch holds.
    AllOf(Vec<Permission<S>>),
    /// Holds when the inner expression does not.
    Not(Box<Permission<S>>),
}

impl<S> Permission<S> {
    /// Creates an atomic permission.
    #[must_use]
    pub fn atom(name: impl Into<String>) -> Self {
        Self::Atom(name.into())
    }

    /// Creates a predicate permission from host logic.
    #[must_use]
    pub fn predicate(f: impl Fn(&S) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    /// Negates this expression.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Combines two expressions so that either suffices.
    ///
    /// Used by requirement propagation: a node's permission is the union of
    /// the permissions of every command reachable through it. `Always`
    /// absorbs everything, and structurally equal branches are not
    /// duplicated.
    #[must_use]
    pub fn or(self, other: Permission<S>) -> Self {
        match (self, other) {
            (Self::Always, _) | (_, Self::Always) => Self::Always,
            (Self::AnyOf(mut left), Self::AnyOf(right)) => {
                for branch in right {
                    if !left.iter().any(|p| p.is_equivalent(&branch)) {
                        left.push(branch);
                    }
                }
                Self::AnyOf(left)
            }
            (Self::AnyOf(mut left), right) => {
                if !left.iter().any(|p| p.is_equivalent(&right)) {
                    left.push(right);
                }
                Self::AnyOf(left)
            }
            (left, Self::AnyOf(mut right)) => {
                if !right.iter().any(|p| p.is_equivalent(&left)) {
                    right.insert(0, left);
                }
                Self::AnyOf(right)
            }
            (left, right) => {
                if left.is_equivalent(&right) {
                    left
                } else {
                    Self::AnyOf(vec![left, right])
                }
            }
        }
    }

    /// Combines two expressions so that both are needed.
    #[must_use]
    pub fn and(self, other: Permission<S>) -> Self {
        match (self, other) {
            (Self::Always, p) | (p, Self::Always) => p,
            (Self::AllOf(mut left), Self::AllOf(right)) => {
                left.extend(right);
                Self::AllOf(left)
            }
            (Self::AllOf(mut left), right) => {
                left.push(right);
                Self::AllOf(left)
            }
            (left, right) => Self::AllOf(vec![left, right]),
        }
    }

    /// Evaluates the expression for `sender` using the host's checker.
    pub fn evaluate(&self, checker: &dyn PermissionChecker<S>, sender: &S) -> bool {
        match self {
            Self::Always => true,
            Self::Atom(name) => checker.has_permission(sender, name),
            Self::Predicate(f) => f(sender),
            Self::AnyOf(branches) => branches.iter().any(|p| p.evaluate(checker, sender)),
            Self::AllOf(branches) => branches.iter().all(|p| p.evaluate(checker, sender)),
            Self::Not(inner) => !inner.evaluate(checker, sender),
        }
    }

    /// Structural equivalence, used to avoid duplicating union branches.
    /// Predicates compare by identity.
    fn is_equivalent(&self, other: &Permission<S>) -> bool {
        match (self, other) {
            (Self::Always, Self::Always) => true,
            (Self::Atom(a), Self::Atom(b)) => a == b,
            (Self::Predicate(a), Self::Predicate(b)) => Arc::ptr_eq(a, b),
            (Self::Not(a), Self::Not(b)) => a.is_equivalent(b),
            (Self::AnyOf(a), Self::AnyOf(b)) | (Self::AllOf(a), Self::AllOf(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.is_equivalent(y))
            }
            _ => false,
        }
    }
}

impl<S> Clone for Permission<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Always => Self::Always,
            Self::Atom(name) => Self::Atom(name.clone()),
            Self::Predicate(f) => Self::Predicate(Arc::clone(f)),
            Self::AnyOf(branches) => Self::AnyOf(branches.clone()),
            Self::AllOf(branches) => Self::AllOf(branches.clone()),
            Self::Not(inner) => Self::Not(inner.clone()),
        }
    }
}

impl<S> fmt::Debug for Permission<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Atom(name) => f.debug_tuple("Atom").field(name).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::AnyOf(branches) => f.debug_tuple("AnyOf").field(branches).finish(),
            Self::AllOf(branches) => f.debug_tuple("AllOf").field(branches).finish(),
            Self::Not(inner) => f.debug_tuple("Not").field(inner).finish(),
        }
    }
}

impl<S> Default for Permission<S> {
    fn default() -> Self {
        Self::Always
    }
}
