//! The declared method table and its invoker-free projection.

use super::value::{ArgKind, CallFault, Value};
use std::collections::HashMap;
use thiserror::Error;

/// A bound invoker for one declared method.
type Invoker<T> = Box<dyn Fn(&mut T, &[Value]) -> Result<Value, CallFault> + Send + Sync>;

/// Why a dispatch attempt did not produce a result.
///
/// The first two variants are protocol violations: they mean the caller and
/// the serving side disagree about what is allowed, which indicates either a
/// bug or a malicious peer. The elevated serve loop terminates on them
/// instead of replying. The latter two are ordinary call failures that are
/// marshaled back to the caller.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The method has no entry in the table.
    #[error("method '{0}' is not allowed across the privilege boundary")]
    NotAllowed(String),

    /// The argument count does not match the declared coercion list.
    #[error("method '{method}' expects {expected} arguments, got {actual}")]
    Arity {
        /// The method that was invoked.
        method: String,
        /// Declared argument count.
        expected: usize,
        /// Received argument count.
        actual: usize,
    },

    /// A raw argument failed its declared coercion.
    #[error("argument {index} of '{method}': {fault}")]
    Argument {
        /// The method that was invoked.
        method: String,
        /// Zero-based index of the failing argument.
        index: usize,
        /// The coercion fault.
        fault: CallFault,
    },

    /// The method itself failed.
    #[error(transparent)]
    Fault(CallFault),
}

impl InvokeError {
    /// Whether this error is a protocol violation rather than a call failure.
    pub fn is_violation(&self) -> bool {
        matches!(self, InvokeError::NotAllowed(_) | InvokeError::Arity { .. })
    }

    /// Convert a call failure into the fault to marshal back to the caller.
    ///
    /// Protocol violations are returned unchanged in `Err` - they must not
    /// be downgraded to per-call faults.
    pub fn into_call_fault(self) -> Result<CallFault, InvokeError> {
        match self {
            InvokeError::Fault(fault) => Ok(fault),
            InvokeError::Argument {
                method,
                index,
                fault,
            } => Ok(CallFault::new(
                fault.kind.clone(),
                format!("argument {index} of '{method}': {}", fault.message),
            )),
            violation => Err(violation),
        }
    }
}

/// One declared method: its ordered argument coercions and bound invoker.
pub struct MethodEntry<T> {
    arg_kinds: &'static [ArgKind],
    invoker: Invoker<T>,
}

/// The explicit mapping from method name to declared entry.
///
/// Built once at startup via [`Elevated::method_table`]. Methods absent from
/// the table do not exist as far as the privilege boundary is concerned,
/// even if the target type has them.
pub struct MethodTable<T> {
    entries: HashMap<&'static str, MethodEntry<T>>,
}

impl<T> MethodTable<T> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Declare a method as callable across the privilege boundary.
    ///
    /// `arg_kinds` fixes both the arity and the coercion applied to each
    /// positional argument. Registering the same name twice replaces the
    /// earlier entry.
    pub fn register(
        mut self,
        name: &'static str,
        arg_kinds: &'static [ArgKind],
        invoker: impl Fn(&mut T, &[Value]) -> Result<Value, CallFault> + Send + Sync + 'static,
    ) -> Self {
        self.entries.insert(
            name,
            MethodEntry {
                arg_kinds,
                invoker: Box::new(invoker),
            },
        );
        self
    }

    /// Absorb another table's declarations.
    ///
    /// This is how a wrapper target inherits its base target's declarations
    /// without redeclaring them. On a name collision the entry already in
    /// `self` wins, so a wrapper may override an inherited method.
    pub fn extend(mut self, other: MethodTable<T>) -> Self {
        for (name, entry) in other.entries {
            self.entries.entry(name).or_insert(entry);
        }
        self
    }

    /// Whether a method is declared.
    pub fn contains(&self, method: &str) -> bool {
        self.entries.contains_key(method)
    }

    /// The declared coercion list for a method, if declared.
    pub fn arg_kinds(&self, method: &str) -> Option<&'static [ArgKind]> {
        self.entries.get(method).map(|e| e.arg_kinds)
    }

    /// Number of declared methods.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table declares nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Project the invoker-free allowlist for the unprivileged side.
    pub fn allowlist(&self) -> AllowList {
        AllowList {
            methods: self
                .entries
                .iter()
                .map(|(name, entry)| (*name, entry.arg_kinds))
                .collect(),
        }
    }

    /// The single dispatch path shared by the local execution context and
    /// the elevated serve loop.
    ///
    /// Looks the method up, checks arity against the declared coercion
    /// count, coerces each raw string argument, and invokes the bound
    /// method on `target`.
    pub fn invoke(
        &self,
        target: &mut T,
        method: &str,
        raw_args: &[String],
    ) -> Result<Value, InvokeError> {
        let entry = self
            .entries
            .get(method)
            .ok_or_else(|| InvokeError::NotAllowed(method.to_string()))?;

        if raw_args.len() != entry.arg_kinds.len() {
            return Err(InvokeError::Arity {
                method: method.to_string(),
                expected: entry.arg_kinds.len(),
                actual: raw_args.len(),
            });
        }

        let mut args = Vec::with_capacity(raw_args.len());
        for (index, (kind, raw)) in entry.arg_kinds.iter().zip(raw_args).enumerate() {
            let value = kind.coerce(raw).map_err(|fault| InvokeError::Argument {
                method: method.to_string(),
                index,
                fault,
            })?;
            args.push(value);
        }

        (entry.invoker)(target, &args).map_err(InvokeError::Fault)
    }
}

impl<T> Default for MethodTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for MethodTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The invoker-free projection of a [`MethodTable`].
///
/// This is all the unprivileged proxy needs: which names are declared and
/// with what arity. Because it is derived from the same table the
/// dispatcher serves from, the two sides agree by construction.
#[derive(Debug, Clone)]
pub struct AllowList {
    methods: HashMap<&'static str, &'static [ArgKind]>,
}

impl AllowList {
    /// Whether a method is declared.
    pub fn contains(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    /// The declared coercion list for a method, if declared.
    pub fn arg_kinds(&self, method: &str) -> Option<&'static [ArgKind]> {
        self.methods.get(method).copied()
    }

    /// Number of declared methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// A privileged target: the object whose declared methods may be executed
/// in the elevated process.
///
/// This trait is the uniform capability-declaration mechanism. The declared
/// name identifies the target in credential prompts and audit logs and
/// never carries anything privileged.
pub trait Elevated {
    /// The target's declared name.
    fn name(&self) -> &str;

    /// Build the method table declaring what may cross the privilege
    /// boundary. Called once per process at startup.
    fn method_table() -> MethodTable<Self>
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter {
        count: i64,
    }

    impl Elevated for Counter {
        fn name(&self) -> &str {
            "counter"
        }

        fn method_table() -> MethodTable<Self> {
            MethodTable::new()
                .register("add", &[ArgKind::Int], |c: &mut Counter, args| {
                    c.count += args[0].expect_int()?;
                    Ok(Value::Int(c.count))
                })
                .register("reset", &[], |c, _| {
                    c.count = 0;
                    Ok(Value::Unit)
                })
        }
    }

    #[test]
    fn test_invoke_declared_method() {
        let table = Counter::method_table();
        let mut counter = Counter { count: 10 };

        let result = table
            .invoke(&mut counter, "add", &["5".to_string()])
            .unwrap();
        assert_eq!(result, Value::Int(15));
        assert_eq!(counter.count, 15);
    }

    #[test]
    fn test_invoke_undeclared_method_rejected() {
        let table = Counter::method_table();
        let mut counter = Counter { count: 0 };

        let err = table.invoke(&mut counter, "_secret", &[]).unwrap_err();
        assert!(matches!(err, InvokeError::NotAllowed(ref m) if m == "_secret"));
        assert!(err.is_violation());
    }

    #[test]
    fn test_invoke_arity_mismatch_is_violation() {
        let table = Counter::method_table();
        let mut counter = Counter { count: 0 };

        let err = table
            .invoke(&mut counter, "add", &["1".to_string(), "2".to_string()])
            .unwrap_err();
        assert!(matches!(
            err,
            InvokeError::Arity {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        assert!(err.is_violation());
    }

    #[test]
    fn test_invoke_coercion_failure_is_call_fault() {
        let table = Counter::method_table();
        let mut counter = Counter { count: 0 };

        let err = table
            .invoke(&mut counter, "add", &["five".to_string()])
            .unwrap_err();
        assert!(!err.is_violation());

        let fault = err.into_call_fault().unwrap();
        assert_eq!(fault.kind, "invalid_argument");
        assert!(fault.message.contains("argument 0 of 'add'"));
    }

    #[test]
    fn test_violation_survives_into_call_fault() {
        let err = InvokeError::NotAllowed("_secret".to_string());
        assert!(err.into_call_fault().is_err());
    }

    #[test]
    fn test_allowlist_agrees_with_table() {
        let table = Counter::method_table();
        let allowlist = table.allowlist();

        assert_eq!(allowlist.len(), table.len());
        for method in ["add", "reset"] {
            assert_eq!(allowlist.contains(method), table.contains(method));
            assert_eq!(allowlist.arg_kinds(method), table.arg_kinds(method));
        }
        assert!(!allowlist.contains("_secret"));
        assert!(!table.contains("_secret"));
    }

    #[test]
    fn test_extend_inherits_base_declarations() {
        let base = Counter::method_table();
        let extended = MethodTable::new()
            .register("double", &[], |c: &mut Counter, _| {
                c.count *= 2;
                Ok(Value::Int(c.count))
            })
            .extend(base);

        assert!(extended.contains("add"));
        assert!(extended.contains("reset"));
        assert!(extended.contains("double"));

        let mut counter = Counter { count: 3 };
        extended.invoke(&mut counter, "double", &[]).unwrap();
        assert_eq!(counter.count, 6);
    }
}
