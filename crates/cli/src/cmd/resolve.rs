use std::path::Path;

use color_eyre::eyre::{eyre, Result};
use simconf_core::calendar::Calendar;
use tracing::debug;
use simconf_core::engine::{EngineConfig, Resolver};
use simconf_core::value::Value;

use crate::ResolveArgs;

pub fn run(root: &Path, args: &ResolveArgs) -> Result<()> {
    let calendar = parse_calendar(&args.calendar)?;
    let resolver = Resolver::new(EngineConfig::new(root.to_path_buf()).with_calendar(calendar));

    let setup = resolver.load_setup(root.join(&args.setup))?;
    let mut trees = Vec::new();
    if let Some(user) = &args.user {
        trees.push(resolver.loader().load(user)?);
    }
    trees.push(setup);

    let resolved = resolver.resolve(Resolver::combine(trees))?;
    debug!(chapters = resolved.len(), "printing resolved tree");
    let yaml = serde_yaml::to_string(&Value::Map(resolved).to_yaml())?;
    print!("{yaml}");
    Ok(())
}

fn parse_calendar(text: &str) -> Result<Calendar> {
    match text {
        "gregorian" | "proleptic-gregorian" => Ok(Calendar::ProlepticGregorian),
        "noleap" | "no-leap" => Ok(Calendar::NoLeap),
        other => match other.strip_prefix("equal:") {
            Some(days) => {
                let days = days
                    .parse()
                    .map_err(|_| eyre!("equal:<days> expects an integer month length"))?;
                Ok(Calendar::EqualMonths(days))
            }
            None => Err(eyre!("unknown calendar '{other}'")),
        },
    }
}
