//! Davfile parser
//!
//! ```text
//! webdav [prefix] {
//!     scope <path>
//!     modify [bool]
//!     allow|allow_r|block|block_r <path or pattern>
//!
//!     <principal>:
//!     scope ...
//! }
//! ```
//!
//! Settings before the first `<principal>:` line apply to the default user.
//! A principal line starts a new user from a copy of the default user, and
//! every setting after it applies to that principal.

use super::dispenser::Dispenser;
use super::lexer::tokenize;
use crate::error::{Error, Result};
use crate::mount::MountSpec;
use crate::rules::{compile_pattern, RuleSpec, DOTFILES};
use crate::user::UserSpec;

/// Name of the mount directive
pub const DIRECTIVE: &str = "webdav";

/// One setting line inside a mount block
#[derive(Debug, Clone, PartialEq, Eq)]
enum Setting {
    Scope(String),
    Modify(bool),
    Rule(RuleSpec),
    User(String),
}

impl Setting {
    fn apply(self, user: &mut UserSpec) {
        match self {
            Setting::Scope(scope) => user.scope = scope,
            Setting::Modify(modify) => user.allow_modify = modify,
            Setting::Rule(rule) => user.rules.push(rule),
            Setting::User(_) => {}
        }
    }
}

/// Parse a whole Davfile. Any error rejects every mount in it.
pub fn parse_davfile(input: &str) -> Result<Vec<MountSpec>> {
    let mut d = Dispenser::new(tokenize(input)?);
    let mut mounts = Vec::new();

    while d.next() {
        if d.val() != DIRECTIVE {
            return Err(d.err(format!("unknown directive '{}'", d.val())));
        }
        mounts.push(parse_mount(&mut d)?);
    }

    Ok(mounts)
}

/// Parse one `webdav` directive; the dispenser sits on the directive name
fn parse_mount(d: &mut Dispenser) -> Result<MountSpec> {
    let args = d.remaining_args();
    if args.len() > 1 {
        return Err(d.arg_err());
    }

    let mut mount = MountSpec::new(args.first().map(String::as_str).unwrap_or(""));
    let mut current: Option<String> = None;

    while d.next_block()? {
        let line = d.line();
        match parse_setting(d)? {
            Setting::User(name) => {
                if mount.declare_user(&name).is_none() {
                    return Err(Error::syntax(
                        line,
                        format!("user '{}' declared twice", name),
                    ));
                }
                current = Some(name);
            }
            setting => {
                let user = mount
                    .user_mut(current.as_deref())
                    .ok_or_else(|| d.err("setting outside of a user context"))?;
                setting.apply(user);
            }
        }
    }

    Ok(mount)
}

/// Parse the setting the dispenser sits on, including its arguments
fn parse_setting(d: &mut Dispenser) -> Result<Setting> {
    let directive = d.val().to_string();

    let setting = match directive.as_str() {
        "scope" => Setting::Scope(d.required_arg()?),
        "modify" => {
            if d.next_arg() {
                let value = parse_bool(d.val())
                    .ok_or_else(|| d.err(format!("invalid boolean '{}'", d.val())))?;
                Setting::Modify(value)
            } else {
                Setting::Modify(true)
            }
        }
        "allow" | "allow_r" | "block" | "block_r" => {
            let arg = d.required_arg()?;
            Setting::Rule(parse_rule(&directive, arg)?)
        }
        _ => {
            if d.next_arg() {
                return Err(d.arg_err());
            }
            let name = directive
                .strip_suffix(':')
                .ok_or_else(|| d.err(format!("unknown directive '{}'", directive)))?;
            if name.is_empty() {
                return Err(d.err("empty user name"));
            }
            Setting::User(name.to_string())
        }
    };

    d.expect_line_end()?;
    Ok(setting)
}

/// Build a rule from its directive name and argument.
///
/// `dotfiles` is always a pattern, even when given to `allow` or `block`.
fn parse_rule(directive: &str, arg: String) -> Result<RuleSpec> {
    let allow = directive.starts_with("allow");
    let is_pattern = directive.ends_with("_r") || arg == DOTFILES;

    if is_pattern {
        compile_pattern(&arg)?;
        Ok(RuleSpec::pattern(allow, arg))
    } else {
        Ok(RuleSpec::literal(allow, arg))
    }
}

/// Boolean spellings accepted by `modify`
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
