//! The runtime library interface table from the code-generation
//! specification's "External Interfaces" section, expressed as data instead
//! of prose so it can be consumed programmatically.

/// A method the emitter can call on a runtime-library class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeMethod {
    /// Slash-separated internal name of the declaring class, e.g. `"com/firefly/runtime/async/Future"`.
    pub owner: &'static str,
    pub name: &'static str,
    /// JVM method descriptor, e.g. `"(Ljava/lang/Runnable;Ljava/util/concurrent/Executor;)Lcom/firefly/runtime/async/Future;"`.
    pub descriptor: &'static str,
    pub is_static: bool,
}

/// A constructor on a runtime-library class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeCtor {
    pub owner: &'static str,
    pub descriptor: &'static str,
}

macro_rules! runtime_method {
    ($owner:expr, $name:expr, $descriptor:expr, static) => {
        RuntimeMethod {
            owner: $owner,
            name: $name,
            descriptor: $descriptor,
            is_static: true,
        }
    };
    ($owner:expr, $name:expr, $descriptor:expr) => {
        RuntimeMethod {
            owner: $owner,
            name: $name,
            descriptor: $descriptor,
            is_static: false,
        }
    };
}

pub const FUTURE: &str = "com/firefly/runtime/async/Future";
pub const PERSISTENT_VECTOR: &str = "com/firefly/runtime/collections/PersistentVector";
pub const ACTOR: &str = "com/firefly/runtime/actor/Actor";
pub const ACTOR_REF: &str = "com/firefly/runtime/actor/Actor$ActorRef";
pub const ACTOR_SYSTEM_HOLDER: &str = "com/firefly/runtime/actor/ActorSystemHolder";
pub const ACTOR_SYSTEM: &str = "com/firefly/runtime/actor/ActorSystem";
pub const RANGE: &str = "com/firefly/runtime/Range";
pub const REFERENCE: &str = "com/firefly/runtime/Reference";
pub const MUTABLE_REFERENCE: &str = "com/firefly/runtime/MutableReference";
pub const FLY_EXCEPTION: &str = "com/firefly/runtime/exceptions/FlyException";

pub const FUTURE_ASYNC_RUNNABLE: RuntimeMethod = runtime_method!(
    FUTURE,
    "async",
    "(Ljava/lang/Runnable;Ljava/util/concurrent/Executor;)Lcom/firefly/runtime/async/Future;",
    static
);
pub const FUTURE_ASYNC_CALLABLE: RuntimeMethod = runtime_method!(
    FUTURE,
    "async",
    "(Ljava/util/concurrent/Callable;Ljava/util/concurrent/Executor;)Lcom/firefly/runtime/async/Future;",
    static
);
pub const FUTURE_ALL: RuntimeMethod = runtime_method!(
    FUTURE,
    "all",
    "([Lcom/firefly/runtime/async/Future;)Lcom/firefly/runtime/async/Future;",
    static
);
pub const FUTURE_ANY: RuntimeMethod = runtime_method!(
    FUTURE,
    "any",
    "([Lcom/firefly/runtime/async/Future;)Lcom/firefly/runtime/async/Future;",
    static
);
pub const FUTURE_TIMEOUT: RuntimeMethod = runtime_method!(
    FUTURE,
    "timeout",
    "(JLjava/util/concurrent/Callable;)Lcom/firefly/runtime/async/Future;",
    static
);
pub const FUTURE_GET: RuntimeMethod =
    runtime_method!(FUTURE, "get", "()Ljava/lang/Object;");

pub const PERSISTENT_VECTOR_OF: RuntimeMethod = runtime_method!(
    PERSISTENT_VECTOR,
    "of",
    "([Ljava/lang/Object;)Lcom/firefly/runtime/collections/PersistentVector;",
    static
);
pub const PERSISTENT_VECTOR_GET: RuntimeMethod =
    runtime_method!(PERSISTENT_VECTOR, "get", "(I)Ljava/lang/Object;");
pub const PERSISTENT_VECTOR_SIZE: RuntimeMethod =
    runtime_method!(PERSISTENT_VECTOR, "size", "()I");

pub const ACTOR_INIT: RuntimeMethod = runtime_method!(ACTOR, "init", "()Ljava/lang/Object;");
pub const ACTOR_HANDLE: RuntimeMethod = runtime_method!(
    ACTOR,
    "handle",
    "(Ljava/lang/Object;Ljava/lang/Object;)Ljava/lang/Object;"
);
pub const ACTOR_REF_SEND: RuntimeMethod = runtime_method!(ACTOR_REF, "send", "(Ljava/lang/Object;)V");
pub const ACTOR_SYSTEM_HOLDER_GET_INSTANCE: RuntimeMethod = runtime_method!(
    ACTOR_SYSTEM_HOLDER,
    "getInstance",
    "()Lcom/firefly/runtime/actor/ActorSystem;",
    static
);
pub const ACTOR_SYSTEM_SPAWN: RuntimeMethod = runtime_method!(
    ACTOR_SYSTEM,
    "spawn",
    "(Lcom/firefly/runtime/actor/Actor;)Lcom/firefly/runtime/actor/Actor$ActorRef;"
);

pub const RANGE_CTOR: RuntimeCtor = RuntimeCtor {
    owner: RANGE,
    descriptor: "(IIZ)V",
};
pub const RANGE_CONTAINS: RuntimeMethod = runtime_method!(RANGE, "contains", "(I)Z");

pub const REFERENCE_OF: RuntimeMethod = runtime_method!(
    REFERENCE,
    "of",
    "(Ljava/lang/Object;)Lcom/firefly/runtime/Reference;",
    static
);
pub const MUTABLE_REFERENCE_OF: RuntimeMethod = runtime_method!(
    MUTABLE_REFERENCE,
    "of",
    "(Ljava/lang/Object;)Lcom/firefly/runtime/MutableReference;",
    static
);

/// Supporting JDK APIs the emitter is allowed to call directly (§6).
pub mod jdk {
    use super::RuntimeMethod;

    pub const OBJECTS_EQUALS: RuntimeMethod = RuntimeMethod {
        owner: "java/util/Objects",
        name: "equals",
        descriptor: "(Ljava/lang/Object;Ljava/lang/Object;)Z",
        is_static: true,
    };
    pub const OBJECTS_HASH: RuntimeMethod = RuntimeMethod {
        owner: "java/util/Objects",
        name: "hash",
        descriptor: "([Ljava/lang/Object;)I",
        is_static: true,
    };
    pub const MATH_POW: RuntimeMethod = RuntimeMethod {
        owner: "java/lang/Math",
        name: "pow",
        descriptor: "(DD)D",
        is_static: true,
    };
    pub const STRING_FORMAT: RuntimeMethod = RuntimeMethod {
        owner: "java/lang/String",
        name: "format",
        descriptor: "(Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/String;",
        is_static: true,
    };
    pub const FORK_JOIN_POOL_COMMON_POOL: RuntimeMethod = RuntimeMethod {
        owner: "java/util/concurrent/ForkJoinPool",
        name: "commonPool",
        descriptor: "()Ljava/util/concurrent/ForkJoinPool;",
        is_static: true,
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn future_descriptors_reference_future_owner() {
        assert_eq!(FUTURE_GET.owner, FUTURE);
        assert!(FUTURE_ASYNC_RUNNABLE.is_static);
        assert!(!FUTURE_GET.is_static);
    }

    #[test]
    fn range_ctor_descriptor_matches_spec() {
        assert_eq!(RANGE_CTOR.descriptor, "(IIZ)V");
    }
}
