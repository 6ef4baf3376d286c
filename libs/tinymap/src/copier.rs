//! Best-effort structural merge of one shape into another.
//!
//! Fields are matched by name and concrete type only. Anything that does not
//! line up is skipped without error: this is a merge, not a validated
//! transform.
//!
//! Matching depends on types alone, so it is decided once per shape pair and
//! recorded in a [`CopyPlan`]. Applying the plan is the only per-value work:
//! read the source field, drop it if it holds its zero value, step through one
//! level of indirection if the plan says so, and clone it into the
//! destination.

use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::fmt;

use crate::field::Kind;
use crate::shape::{FieldDescriptor, Shape, ShapeDescriptor, ShapeKey};

/// Why a source field is not part of a [`CopyPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The source field is not `pub`.
    Unexported,
    /// The destination has no field with this name.
    MissingInDestination,
    /// The destination field exists but is not `pub`.
    DestinationUnexported,
    KindMismatch { source: Kind, destination: Kind },
    TypeMismatch {
        source: &'static str,
        destination: &'static str,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unexported => f.write_str("source field is not exported"),
            SkipReason::MissingInDestination => f.write_str("no such field in destination"),
            SkipReason::DestinationUnexported => {
                f.write_str("destination field is not exported")
            }
            SkipReason::KindMismatch {
                source,
                destination,
            } => write!(f, "kind mismatch: {source} vs {destination}"),
            SkipReason::TypeMismatch {
                source,
                destination,
            } => write!(f, "type mismatch: {source} vs {destination}"),
        }
    }
}

/// A source field the plan will never copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedField {
    pub name: &'static str,
    pub reason: SkipReason,
}

#[derive(Clone)]
struct CopyStep {
    /// Embedded fields leading from the source root to the shape that
    /// declares `source`, outermost first.
    path: Vec<FieldDescriptor>,
    source: FieldDescriptor,
    target: FieldDescriptor,
    /// Resolve one level of indirection on the source value before assigning.
    indirect: bool,
    /// Another step of the plan writes the same destination field.
    contested: bool,
}

impl CopyStep {
    fn read<'a>(&self, root: &'a dyn Any) -> Option<&'a dyn Any> {
        let mut shape = root;
        for embedded in &self.path {
            shape = embedded.read(shape)?;
        }
        self.source.read(shape)
    }
}

/// Precomputed field matches from one shape to another.
#[derive(Clone)]
pub struct CopyPlan {
    source: ShapeKey,
    destination: ShapeKey,
    steps: Vec<CopyStep>,
    skipped: Vec<SkippedField>,
}

impl CopyPlan {
    pub fn for_shapes<S: Shape, D: Shape>() -> Self {
        Self::build(&S::describe(), &D::describe())
    }

    /// Matches the fields of `source` against `destination`.
    ///
    /// Walks the source fields breadth first. Embedded shapes are flattened,
    /// so a field declared directly on the source comes before a same-named
    /// field promoted from an embedded shape; the deeper one is only written
    /// when the shallower one was not.
    pub fn build(source: &ShapeDescriptor, destination: &ShapeDescriptor) -> Self {
        let mut steps = Vec::new();
        let mut skipped = Vec::new();
        let mut claimed = HashSet::new();
        let mut contested = HashSet::new();

        let mut work: VecDeque<(Vec<FieldDescriptor>, FieldDescriptor)> = source
            .fields()
            .iter()
            .map(|field| (Vec::new(), field.clone()))
            .collect();

        while let Some((path, field)) = work.pop_front() {
            let name = field.name();
            let mut skip = |reason| skipped.push(SkippedField { name, reason });

            if !field.is_exported() {
                skip(SkipReason::Unexported);
                continue;
            }

            if let Some(inner) = field.embedded_shape() {
                let mut path = path;
                path.push(field);
                for nested in inner.fields() {
                    work.push_back((path.clone(), nested.clone()));
                }
                continue;
            }

            let Some(target) = destination.field(name) else {
                skip(SkipReason::MissingInDestination);
                continue;
            };
            if !target.is_exported() {
                skip(SkipReason::DestinationUnexported);
                continue;
            }
            let source_vtable = field.vtable();
            let target_vtable = target.vtable();
            let indirect = if source_vtable.same_type(target_vtable) {
                false
            } else {
                let resolved = source_vtable.pointee().unwrap_or(source_vtable);
                if resolved.kind() != target_vtable.kind() {
                    skip(SkipReason::KindMismatch {
                        source: resolved.kind(),
                        destination: target_vtable.kind(),
                    });
                    continue;
                }
                if !resolved.same_type(target_vtable) {
                    skip(SkipReason::TypeMismatch {
                        source: resolved.type_name(),
                        destination: target_vtable.type_name(),
                    });
                    continue;
                }
                true
            };

            if !claimed.insert(name) {
                contested.insert(name);
            }
            steps.push(CopyStep {
                path,
                source: field,
                target: target.clone(),
                indirect,
                contested: false,
            });
        }

        for step in &mut steps {
            step.contested = contested.contains(step.target.name());
        }

        Self {
            source: source.key(),
            destination: destination.key(),
            steps,
            skipped,
        }
    }

    pub fn source(&self) -> ShapeKey {
        self.source
    }

    pub fn destination(&self) -> ShapeKey {
        self.destination
    }

    /// Names of the destination fields this plan can write, each once.
    pub fn copied_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        let mut seen = HashSet::new();
        self.steps
            .iter()
            .map(|step| step.target.name())
            .filter(move |name| seen.insert(*name))
    }

    pub fn skipped(&self) -> &[SkippedField] {
        &self.skipped
    }

    /// Copies every non-zero matched field of `source` into `destination`.
    ///
    /// Returns the number of fields written. Values that are not of the
    /// plan's shapes are left untouched.
    pub fn apply(&self, destination: &mut dyn Any, source: &dyn Any) -> usize {
        let mut copied = 0;
        let mut written: Vec<&'static str> = Vec::new();
        for step in &self.steps {
            if step.contested && written.contains(&step.target.name()) {
                continue;
            }
            let Some(value) = step.read(source) else {
                continue;
            };
            if step.source.vtable().is_zero(value) {
                tracing::trace!(field = step.source.name(), "zero value, skipping");
                continue;
            }
            let value = if step.indirect {
                match step.source.vtable().resolve(value) {
                    Some(value) => value,
                    None => continue,
                }
            } else {
                value
            };
            let Some(slot) = step.target.write(destination) else {
                continue;
            };
            if step.target.vtable().assign(slot, value) {
                copied += 1;
                if step.contested {
                    written.push(step.target.name());
                }
            }
        }
        copied
    }
}

impl fmt::Debug for CopyPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyPlan")
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("copies", &self.copied_fields().collect::<Vec<_>>())
            .field("skipped", &self.skipped)
            .finish()
    }
}

/// Merges the fields of `source` into `destination` in place.
///
/// Builds a throwaway [`CopyPlan`]; hold on to one from
/// [`CopyPlan::for_shapes`] when copying the same pair repeatedly.
pub fn copy<D: Shape, S: Shape>(destination: &mut D, source: &S) -> usize {
    CopyPlan::for_shapes::<S, D>().apply(destination, source)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::Shape;

    #[derive(Debug, Clone, Default, PartialEq, Shape)]
    struct Audit {
        pub created_by: String,
        pub revision: u32,
    }

    #[derive(Debug, Clone, Default, PartialEq, Shape)]
    struct Account {
        pub id: u64,
        pub name: String,
        pub nickname: Option<String>,
        pub balance: f64,
        pub tags: Vec<String>,
        pub limit: Box<u32>,
        secret: String,
        #[shape(embed)]
        pub audit: Audit,
    }

    #[derive(Debug, Clone, Default, PartialEq, Shape)]
    struct AccountView {
        pub id: u64,
        pub name: String,
        pub nickname: String,
        pub balance: i64,
        pub tags: Vec<String>,
        pub limit: u32,
        pub secret: String,
        pub created_by: String,
        revision: u32,
    }

    fn account() -> Account {
        Account {
            id: 7,
            name: "checking".into(),
            nickname: Some("daily".into()),
            balance: 12.5,
            tags: vec!["a".into()],
            limit: Box::new(500),
            secret: "hunter2".into(),
            audit: Audit {
                created_by: "ops".into(),
                revision: 3,
            },
        }
    }

    #[test]
    fn copies_matching_fields_and_resolves_indirection() {
        let mut view = AccountView::default();
        let copied = copy(&mut view, &account());

        assert_eq!(view.id, 7);
        assert_eq!(view.name, "checking");
        assert_eq!(view.nickname, "daily");
        assert_eq!(view.tags, vec!["a".to_string()]);
        assert_eq!(view.limit, 500);
        assert_eq!(view.created_by, "ops");
        assert_eq!(copied, 6);
    }

    #[test]
    fn never_copies_mismatched_or_private_fields() {
        let mut view = AccountView::default();
        copy(&mut view, &account());

        assert_eq!(view.balance, 0);
        assert_eq!(view.secret, "");
        assert_eq!(view.revision, 0);
    }

    #[test]
    fn zero_values_leave_destination_untouched() {
        let mut view = AccountView {
            id: 99,
            name: "keep".into(),
            nickname: "keep".into(),
            ..AccountView::default()
        };
        let source = Account {
            id: 0,
            name: String::new(),
            nickname: None,
            ..account()
        };
        copy(&mut view, &source);

        assert_eq!(view.id, 99);
        assert_eq!(view.name, "keep");
        assert_eq!(view.nickname, "keep");
    }

    #[test]
    fn plan_records_skip_reasons() {
        let plan = CopyPlan::for_shapes::<Account, AccountView>();
        let reason = |name: &str| {
            plan.skipped()
                .iter()
                .find(|skipped| skipped.name == name)
                .map(|skipped| skipped.reason)
        };

        assert_eq!(reason("secret"), Some(SkipReason::Unexported));
        assert_eq!(
            reason("balance"),
            Some(SkipReason::KindMismatch {
                source: Kind::Float,
                destination: Kind::Int,
            })
        );
        assert_eq!(reason("revision"), Some(SkipReason::DestinationUnexported));
        assert!(reason("audit").is_none());
        assert!(reason("id").is_none());

        let mut copied: Vec<_> = plan.copied_fields().collect();
        copied.sort_unstable();
        assert_eq!(
            copied,
            ["created_by", "id", "limit", "name", "nickname", "tags"]
        );
    }

    #[derive(Debug, Clone, Default, PartialEq, Shape)]
    struct Wide {
        pub count: u64,
        pub ratio: f32,
    }

    #[derive(Debug, Clone, Default, PartialEq, Shape)]
    struct Narrow {
        pub count: u32,
        pub ratio: f32,
        pub extra: bool,
    }

    #[test]
    fn same_kind_different_type_is_skipped() {
        let plan = CopyPlan::for_shapes::<Wide, Narrow>();
        assert_eq!(
            plan.skipped(),
            [SkippedField {
                name: "count",
                reason: SkipReason::TypeMismatch {
                    source: "u64",
                    destination: "u32",
                },
            }]
        );

        let mut narrow = Narrow::default();
        copy(&mut narrow, &Wide { count: 4, ratio: 0.25 });
        assert_eq!(narrow, Narrow { count: 0, ratio: 0.25, extra: false });
    }

    #[derive(Debug, Clone, Default, PartialEq, Shape)]
    struct Base {
        pub id: u32,
        pub region: String,
    }

    #[derive(Debug, Clone, Default, PartialEq, Shape)]
    struct Derived {
        #[shape(embed)]
        pub base: Base,
        pub id: u32,
    }

    #[derive(Debug, Clone, Default, PartialEq, Shape)]
    struct Flat {
        pub id: u32,
        pub region: String,
    }

    #[test]
    fn direct_fields_shadow_embedded_ones() {
        let plan = CopyPlan::for_shapes::<Derived, Flat>();
        assert!(plan.skipped().is_empty());
        assert_eq!(plan.copied_fields().collect::<Vec<_>>(), ["id", "region"]);

        let source = Derived {
            base: Base {
                id: 1,
                region: "eu".into(),
            },
            id: 2,
        };
        let mut flat = Flat::default();
        copy(&mut flat, &source);
        assert_eq!(flat, Flat { id: 2, region: "eu".into() });
    }

    #[test]
    fn zero_direct_field_falls_back_to_embedded_one() {
        let source = Derived {
            base: Base {
                id: 7,
                region: String::new(),
            },
            id: 0,
        };
        let mut flat = Flat {
            id: 1,
            region: "us".into(),
        };
        assert_eq!(copy(&mut flat, &source), 1);
        assert_eq!(flat, Flat { id: 7, region: "us".into() });

        let both_zero = Derived::default();
        let mut flat = Flat {
            id: 1,
            region: "us".into(),
        };
        assert_eq!(copy(&mut flat, &both_zero), 0);
        assert_eq!(flat.id, 1);
    }

    #[derive(Debug, Clone, Default, PartialEq, Shape)]
    struct Shared {
        pub label: Arc<String>,
        pub maybe: Option<u8>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Shape)]
    struct SharedSame {
        pub label: Arc<String>,
        pub maybe: Option<u8>,
    }

    #[test]
    fn identical_wrapper_types_copy_without_indirection() {
        let source = Shared {
            label: Arc::new("x".into()),
            maybe: Some(0),
        };
        let mut destination = SharedSame::default();
        assert_eq!(copy(&mut destination, &source), 2);
        assert_eq!(destination.label.as_str(), "x");
        assert_eq!(destination.maybe, Some(0));
    }

    #[test]
    fn apply_ignores_values_of_other_shapes() {
        let plan = CopyPlan::for_shapes::<Wide, Narrow>();
        let mut wrong = Flat::default();
        assert_eq!(plan.apply(&mut wrong, &Wide { count: 1, ratio: 1.0 }), 0);
        assert_eq!(wrong, Flat::default());
        assert_eq!(plan.source(), ShapeKey::of::<Wide>());
        assert_eq!(plan.destination(), ShapeKey::of::<Narrow>());
    }
}
