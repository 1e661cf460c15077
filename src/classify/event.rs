/// Allocator entry points the instrumentation reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `malloc(size)`
    Malloc,
    /// `calloc(count, elem_size)`
    Calloc,
    /// `realloc(ptr, size)`
    Realloc,
    /// `free(ptr)`
    Free,
    /// `memalign(alignment, size)`
    Memalign,
    /// `valloc(size)`
    Valloc,
    /// `posix_memalign(memptr, alignment, size)`
    PosixMemalign,
}

impl CallKind {
    /// Look up a call by the function name printed in the trace.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "malloc" => CallKind::Malloc,
            "calloc" => CallKind::Calloc,
            "realloc" => CallKind::Realloc,
            "free" => CallKind::Free,
            "memalign" => CallKind::Memalign,
            "valloc" => CallKind::Valloc,
            "posix_memalign" => CallKind::PosixMemalign,
            _ => return None,
        };
        Some(kind)
    }

    /// Function name as printed in the trace.
    pub fn name(self) -> &'static str {
        match self {
            CallKind::Malloc => "malloc",
            CallKind::Calloc => "calloc",
            CallKind::Realloc => "realloc",
            CallKind::Free => "free",
            CallKind::Memalign => "memalign",
            CallKind::Valloc => "valloc",
            CallKind::PosixMemalign => "posix_memalign",
        }
    }
}

/// Allocator event recovered from one trace line.
///
/// Borrowed from the line it was parsed out of; the engine copies the
/// caller and address tokens only when a record is stored. Sizes never
/// exceed `i64::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocEvent<'a> {
    /// `size` bytes handed out at `address`.
    Allocate {
        /// Caller token
        caller: &'a str,
        /// Requested size in bytes
        size: u64,
        /// Returned address token
        address: &'a str,
    },

    /// Allocation at `address` given back.
    Release {
        /// Caller token of the releasing code (informational)
        caller: &'a str,
        /// Released address token
        address: &'a str,
    },

    /// Allocation at `old_address` resized to `size` bytes at `new_address`.
    Reallocate {
        /// Caller token; owns the new record
        caller: &'a str,
        /// Address being resized
        old_address: &'a str,
        /// New size in bytes
        size: u64,
        /// Returned address token (may equal `old_address`)
        new_address: &'a str,
    },

    /// `count * elem_size` zeroed bytes handed out at `address`.
    AllocateZeroed {
        /// Caller token
        caller: &'a str,
        /// Number of elements
        count: u64,
        /// Size of one element in bytes
        elem_size: u64,
        /// Returned address token
        address: &'a str,
    },

    /// Call that returned null; nothing changed hands.
    Failed {
        /// Caller token
        caller: &'a str,
        /// Which call failed
        call: CallKind,
    },
}

impl<'a> AllocEvent<'a> {
    /// Caller token printed on the trace line.
    pub fn caller(&self) -> &'a str {
        match *self {
            AllocEvent::Allocate { caller, .. }
            | AllocEvent::Release { caller, .. }
            | AllocEvent::Reallocate { caller, .. }
            | AllocEvent::AllocateZeroed { caller, .. }
            | AllocEvent::Failed { caller, .. } => caller,
        }
    }
}
