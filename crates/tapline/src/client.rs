//! Lazily constructed, memoized client shared by every stream of a tap.
//!
//! The tap registers one constructor. The first stream that asks for the
//! client triggers construction from the validated config; later requests
//! get the same instance.

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::config::ConfigMap;
use crate::error::{Result, TapError};

type ClientCtor = Box<dyn Fn(&ConfigMap) -> Result<Rc<dyn Any>>>;

struct Constructor {
    build: ClientCtor,
    type_id: TypeId,
    type_name: &'static str,
}

/// Holds the client constructor and the memoized instance.
#[derive(Default)]
pub struct ClientFactory {
    ctor: Option<Constructor>,
    instance: RefCell<Option<Rc<dyn Any>>>,
}

impl ClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client constructor, discarding any instance already built.
    pub fn configure<C, F>(&mut self, ctor: F)
    where
        C: 'static,
        F: Fn(&ConfigMap) -> Result<C> + 'static,
    {
        self.ctor = Some(Constructor {
            build: Box::new(move |config| Ok(Rc::new(ctor(config)?) as Rc<dyn Any>)),
            type_id: TypeId::of::<C>(),
            type_name: type_name::<C>(),
        });
        *self.instance.get_mut() = None;
    }

    /// Get the client, constructing it from `config` on first access.
    ///
    /// Fails with [`TapError::NoClientConfigured`] when no constructor was
    /// set and [`TapError::ClientTypeMismatch`] when `C` is not the type the
    /// constructor produces.
    pub fn get<C: 'static>(&self, config: &ConfigMap) -> Result<Rc<C>> {
        let ctor = self.ctor.as_ref().ok_or(TapError::NoClientConfigured)?;
        if ctor.type_id != TypeId::of::<C>() {
            return Err(TapError::ClientTypeMismatch {
                expected: type_name::<C>(),
            });
        }

        let existing = self.instance.borrow().clone();
        let client = match existing {
            Some(client) => client,
            None => {
                debug!("Constructing client {}", ctor.type_name);
                let client = (ctor.build)(config)?;
                *self.instance.borrow_mut() = Some(Rc::clone(&client));
                client
            }
        };

        client
            .downcast::<C>()
            .map_err(|_| TapError::ClientTypeMismatch {
                expected: type_name::<C>(),
            })
    }
}

impl fmt::Debug for ClientFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFactory")
            .field("client", &self.ctor.as_ref().map(|c| c.type_name))
            .field("constructed", &self.instance.borrow().is_some())
            .finish()
    }
}
