use std::path::PathBuf;

use location_core::{
    ConfigureOptions, Heading, Location, PermissionStatus, RequestPermissionOptions, Warning,
};
use location_demo::prelude::*;
use specta::TypeCollection;
use specta_typescript::{BigIntExportBehavior, Typescript};

fn mk_types() -> TypeCollection {
    let mut types = TypeCollection::default();
    types
        .register::<Location>()
        .register::<Heading>()
        .register::<PermissionStatus>()
        .register::<ConfigureOptions>()
        .register::<RequestPermissionOptions>()
        .register::<Warning>();
    types
}

pub fn main() -> Result {
    let args = std::env::args().collect::<Vec<_>>();
    let path = args.get(1).context("Usage: export-types path")?;
    let path = PathBuf::from(path);

    Typescript::new()
        .header("// This file is generated by export-types, do not edit it by hand")
        // Intervals are milliseconds, well within a JS number
        .bigint(BigIntExportBehavior::Number)
        .export_to(&path, &mk_types())
        .context("Failed to export types")?;

    println!("Successfully exported types to {}", path.display());
    Ok(())
}
