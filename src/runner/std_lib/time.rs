//! `helix:time`

use std::time::Duration;

use crate::error::{RegistrationError, ScriptError};
use crate::runner::ds::conversion::Kind;
use crate::runner::plugin::binding::{BindingTarget, Param};
use crate::runner::plugin::namespace::Namespace;

fn duration(name: &str) -> BindingTarget {
    BindingTarget::new(name).param(Param::new("duration", Kind::Duration).not_null())
}

pub fn register(ns: &Namespace) -> Result<(), RegistrationError> {
    ns.method(duration("millis"), |args| {
        let d: Duration = args.get(0)?;
        Ok(i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
    })?
    .method(duration("seconds"), |args| Ok(args.get::<Duration>(0)?.as_secs_f64()))?
    .method(
        BindingTarget::new("of_millis").param(Param::new("millis", Kind::Int).not_null()),
        |args| {
            let millis: i64 = args.get(0)?;
            u64::try_from(millis)
                .map(Duration::from_millis)
                .map_err(|_| ScriptError::new(format!("{} is not a valid duration", millis)))
        },
    )?;
    Ok(())
}
