//! BridgeSession: one Host interpreter bridged to one Guest runtime
//!
//! A session owns the Guest runtime and the imported Guest module, and
//! borrows the Host interpreter. Every bridge operation takes the session
//! explicitly; callbacks registered by [`define_class`](BridgeSession::define_class)
//! capture a weak reference to it, so closing the session (or dropping its
//! last handle) turns later callbacks into Guest `RuntimeError`s instead of
//! keeping the session alive.

use std::sync::{Arc, Weak};

use ferry_guest::{inittab, registry, GuestRuntime, GuestValue, ModuleDef};
use ferry_host::{HostClass, HostContext, HostValue};
use parking_lot::Mutex;

use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::trace::Tracer;
use crate::{convert, invoke, proxy, synth};

/// The most recent successful class definition
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveBinding {
    /// Host object the synthesized methods dispatch to
    pub origin: HostValue,
    /// Name of the synthesized Guest type
    pub class_name: String,
}

pub(crate) struct SessionInner {
    host: Arc<dyn HostContext>,
    guest: GuestRuntime,
    /// `None` once the session is closed
    module: Mutex<Option<GuestValue>>,
    config: BridgeConfig,
    tracer: Tracer,
    proxy_class: Arc<HostClass>,
    active: Mutex<Option<ActiveBinding>>,
}

/// Handle to an open bridge session. Cheap to clone.
#[derive(Clone)]
pub struct BridgeSession {
    inner: Arc<SessionInner>,
}

impl BridgeSession {
    /// Start a Guest runtime and import `config.module` into it.
    ///
    /// The module is taken from the process inittab when present (so its
    /// own functions are available to [`call_function`](Self::call_function))
    /// and always gets the registry services installed. The proxy class is
    /// registered with the Host unless it already defines one.
    pub fn open(host: Arc<dyn HostContext>, config: BridgeConfig) -> BridgeResult<Self> {
        config.validate()?;
        let tracer = Tracer::new(config.debug);

        let guest = GuestRuntime::initialize();
        let def = inittab::lookup(&config.module).unwrap_or_else(|| ModuleDef::new(&config.module));
        guest.register_module(registry::install(def));

        let module = match guest.import(&config.module) {
            Ok(module) => module,
            Err(e) => {
                if let Err(teardown) = guest.finalize() {
                    tracer.warn(&format!("teardown after failed import: {}", teardown));
                }
                return Err(e.into());
            }
        };
        if config.debug {
            guest.call_method(&module, "debug_on", &[])?;
        }

        let proxy_class = match host.find_class(&config.proxy_class) {
            Some(class) => class,
            None => host.register_class(proxy::proxy_class(&config.proxy_class)),
        };

        tracer.debug(0, &format!("session open (module {})", config.module));
        Ok(Self {
            inner: Arc::new(SessionInner {
                host,
                guest,
                module: Mutex::new(Some(module)),
                config,
                tracer,
                proxy_class,
                active: Mutex::new(None),
            }),
        })
    }

    pub(crate) fn downgrade(&self) -> Weak<SessionInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<SessionInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Check if two handles refer to the same session
    pub fn same_session(&self, other: &BridgeSession) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The Host interpreter
    pub fn host(&self) -> &Arc<dyn HostContext> {
        &self.inner.host
    }

    /// The Guest runtime
    pub fn guest(&self) -> &GuestRuntime {
        &self.inner.guest
    }

    /// Session configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Diagnostic tracer
    pub fn tracer(&self) -> &Tracer {
        &self.inner.tracer
    }

    /// Host class of Opaque Reference Proxies
    pub fn proxy_class(&self) -> &Arc<HostClass> {
        &self.inner.proxy_class
    }

    /// The imported Guest module
    pub fn module(&self) -> BridgeResult<GuestValue> {
        self.inner.module.lock().clone().ok_or(BridgeError::NotInitialized)
    }

    /// Check if the session has not been closed
    pub fn is_open(&self) -> bool {
        self.inner.module.lock().is_some()
    }

    /// The most recent successful class definition
    pub fn active_binding(&self) -> Option<ActiveBinding> {
        self.inner.active.lock().clone()
    }

    pub(crate) fn set_active_binding(&self, binding: ActiveBinding) {
        *self.inner.active.lock() = Some(binding);
    }

    /// Call one of the module's registry services
    pub fn registry_call(&self, name: &str, args: &[GuestValue]) -> BridgeResult<GuestValue> {
        let module = self.module()?;
        Ok(self.inner.guest.call_method(&module, name, args)?)
    }

    // ========================================================================
    // Bridge operations
    // ========================================================================

    /// Convert a Host value into a Guest value
    pub fn to_guest(&self, value: &HostValue) -> BridgeResult<GuestValue> {
        convert::to_guest(self, value)
    }

    /// Convert a Guest value into a Host value (`None`, `str`, tuples)
    pub fn to_host(&self, value: &GuestValue) -> BridgeResult<HostValue> {
        convert::to_host(self, value)
    }

    /// Convert a Guest value into a Host value, or wrap it in a proxy
    pub fn to_host_or_proxy(&self, value: &GuestValue) -> BridgeResult<HostValue> {
        convert::to_host_or_proxy(self, value)
    }

    /// Wrap a Guest value in an Opaque Reference Proxy
    pub fn make_proxy(&self, value: &GuestValue) -> BridgeResult<HostValue> {
        proxy::make_proxy(self, value)
    }

    /// Call a module function by name. `Ok(None)` when it returns `None`.
    pub fn call_function(&self, name: &str, args: Option<&HostValue>) -> BridgeResult<Option<HostValue>> {
        invoke::call_function(self, name, args)
    }

    /// Call a method on the Guest object a proxy denotes
    pub fn call_method(&self, proxy: &HostValue, name: &str, args: &[HostValue]) -> BridgeResult<HostValue> {
        invoke::call_method(self, proxy, name, args)
    }

    /// `str()` of the Guest object a proxy denotes
    pub fn string_value(&self, proxy: &HostValue) -> BridgeResult<String> {
        invoke::string_value(self, proxy)
    }

    /// Synthesize a Guest type whose methods dispatch to `origin`
    pub fn define_class(
        &self,
        origin: &HostValue,
        class_name: &str,
        base: &str,
        method_names: &[String],
    ) -> BridgeResult<()> {
        synth::define_class(self, origin, class_name, base, method_names)
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Release the module and shut the Guest runtime down.
    ///
    /// Closing an already closed session succeeds. Proxies and callbacks
    /// that outlive the session fail with an error when used.
    pub fn close(&self) -> BridgeResult<()> {
        let module = self.inner.module.lock().take();
        let Some(module) = module else {
            return Ok(());
        };
        drop(module);
        self.inner.active.lock().take();

        self.inner.tracer.debug(0, "session close");
        self.inner.guest.finalize()?;
        Ok(())
    }
}

impl std::fmt::Debug for BridgeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeSession")
            .field("module", &self.inner.config.module)
            .field("open", &self.is_open())
            .field("active", &self.active_binding().map(|b| b.class_name))
            .finish()
    }
}
