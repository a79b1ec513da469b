pub mod lookup;

use crate::event::Event;

/// The variant a rule declares itself as. The chain evaluator dispatches on
/// this tag; a result whose own tag disagrees is ignored rather than acted
/// on, so a misbehaving rule cannot take down the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleVariant {
    Filter,
    Transform,
}

/// The outcome of applying a single rule to an event.
#[derive(Debug)]
pub enum RuleResult<T> {
    Filter { drop: bool, reason: String },
    Transform { event: Option<Event<T>> },
}

/// A single step in the processor's rule chain. Filters may read the event
/// to decide whether to drop it; transforms may mutate the event in place,
/// return a replacement, or both (the replacement wins if present).
pub trait Rule<T>: Send + Sync {
    fn apply(&self, event: &mut Event<T>) -> RuleResult<T>;
    fn variant(&self) -> RuleVariant;
}

/// Walks `rules` left to right. A filter result with `drop: true` stops the
/// walk and the event is discarded (`None`). A transform result carrying a
/// replacement event swaps it in; otherwise any in-place mutation already
/// applied by `apply` stands. A result whose tag does not match the rule's
/// declared variant is ignored.
pub(crate) fn evaluate_chain<T>(rules: &[Box<dyn Rule<T>>], mut evt: Event<T>) -> Option<Event<T>> {
    for rule in rules {
        let declared = rule.variant();
        let result = rule.apply(&mut evt);
        match (declared, result) {
            (RuleVariant::Filter, RuleResult::Filter { drop, reason: _ }) => {
                if drop {
                    return None;
                }
            }
            (RuleVariant::Transform, RuleResult::Transform { event }) => {
                if let Some(replacement) = event {
                    evt = replacement;
                }
            }
            _ => {
                // Declared variant and result tag disagree; ignore and continue.
            }
        }
    }
    Some(evt)
}

/// Builds a `Rule<T>` from a closure, for callers who don't want to name a
/// struct and hand-write a trait impl for a one-off rule.
pub struct FnRule<T> {
    variant: RuleVariant,
    func: Box<dyn Fn(&mut Event<T>) -> RuleResult<T> + Send + Sync>,
}

impl<T> FnRule<T> {
    pub fn new(
        variant: RuleVariant,
        func: impl Fn(&mut Event<T>) -> RuleResult<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            variant,
            func: Box::new(func),
        }
    }
}

impl<T> Rule<T> for FnRule<T> {
    fn apply(&self, event: &mut Event<T>) -> RuleResult<T> {
        (self.func)(event)
    }

    fn variant(&self) -> RuleVariant {
        self.variant
    }
}
