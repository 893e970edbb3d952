//! Per-layer mapping from source attribute columns onto output fields.
//!
//! ABS publishes the same logical column under several spellings
//! (`SA2_CODE21`, `SA2_CODE_2021`, `GCC_NAME21` for `GCCSA_NAME`, ...).
//! Each layer lists its canonical fields with the base aliases to try;
//! year suffixes are added during resolution.

use crate::models::{Field, LayerKey};

/// One canonical column of a layer
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    pub field: Field,
    pub aliases: &'static [&'static str],
    pub required: bool,
}

const fn col(field: Field, aliases: &'static [&'static str], required: bool) -> ColumnSpec {
    ColumnSpec {
        field,
        aliases,
        required,
    }
}

const SA1_CODE: &[&str] = &["SA1_CODE", "SA1"];
const SA2_CODE: &[&str] = &["SA2_CODE"];
const SA2_NAME: &[&str] = &["SA2_NAME"];
const SA3_CODE: &[&str] = &["SA3_CODE"];
const SA3_NAME: &[&str] = &["SA3_NAME"];
const SA4_CODE: &[&str] = &["SA4_CODE"];
const SA4_NAME: &[&str] = &["SA4_NAME"];
const GCC_CODE: &[&str] = &["GCCSA_CODE", "GCC_CODE"];
const GCC_NAME: &[&str] = &["GCCSA_NAME", "GCC_NAME"];
const STE_CODE: &[&str] = &["STE_CODE", "STATE_CODE"];
const STE_NAME: &[&str] = &["STE_NAME", "STATE_NAME"];

/// SA1 carries its whole parent chain
const SA1_COLUMNS: &[ColumnSpec] = &[
    col(Field::Sa1Code, SA1_CODE, true),
    col(Field::Sa2Code, SA2_CODE, true),
    col(Field::Sa2Name, SA2_NAME, true),
    col(Field::Sa3Code, SA3_CODE, false),
    col(Field::Sa3Name, SA3_NAME, true),
    col(Field::Sa4Code, SA4_CODE, false),
    col(Field::Sa4Name, SA4_NAME, true),
    col(Field::GccsaCode, GCC_CODE, false),
    col(Field::GccsaName, GCC_NAME, true),
    col(Field::StateCode, STE_CODE, true),
    col(Field::StateName, STE_NAME, true),
];

const SA2_COLUMNS: &[ColumnSpec] = &[
    col(Field::Sa2Code, SA2_CODE, false),
    col(Field::Sa2Name, SA2_NAME, false),
];

const SA3_COLUMNS: &[ColumnSpec] = &[
    col(Field::Sa3Code, SA3_CODE, false),
    col(Field::Sa3Name, SA3_NAME, false),
];

const SA4_COLUMNS: &[ColumnSpec] = &[
    col(Field::Sa4Code, SA4_CODE, false),
    col(Field::Sa4Name, SA4_NAME, false),
];

const GCCSA_COLUMNS: &[ColumnSpec] = &[
    col(Field::GccsaCode, GCC_CODE, false),
    col(Field::GccsaName, GCC_NAME, false),
];

const STE_COLUMNS: &[ColumnSpec] = &[
    col(Field::StateCode, STE_CODE, false),
    col(Field::StateName, STE_NAME, false),
];

const IARE_COLUMNS: &[ColumnSpec] = &[
    col(Field::IareCode, &["IARE_CODE"], true),
    col(Field::IareName, &["IARE_NAME"], true),
    col(Field::IregCode, &["IREG_CODE"], true),
    col(Field::IregName, &["IREG_NAME"], true),
];

/// Columns a layer file must (or may) provide
#[derive(Debug, Clone, Copy)]
pub struct LayerSchema {
    pub key: LayerKey,
    pub columns: &'static [ColumnSpec],
}

impl LayerSchema {
    pub fn for_key(key: LayerKey) -> Self {
        let columns = match key {
            LayerKey::Sa1 => SA1_COLUMNS,
            LayerKey::Sa2 => SA2_COLUMNS,
            LayerKey::Sa3 => SA3_COLUMNS,
            LayerKey::Sa4 => SA4_COLUMNS,
            LayerKey::Gccsa => GCCSA_COLUMNS,
            LayerKey::Ste => STE_COLUMNS,
            LayerKey::Iare => IARE_COLUMNS,
        };
        Self { key, columns }
    }

    /// Resolve each canonical field to the matching source column name.
    ///
    /// Returns the first missing column's canonical name on failure:
    /// either a required column, or, when nothing is required, the first
    /// column of a layer that matched none at all.
    pub fn resolve<'a, I>(&self, available: I) -> Result<Vec<(Field, String)>, &'static str>
    where
        I: IntoIterator<Item = &'a str> + Clone,
    {
        let mut resolved = Vec::new();
        for spec in self.columns {
            match find_column(spec.aliases, available.clone()) {
                Some(source) => resolved.push((spec.field, source.to_string())),
                None if spec.required => return Err(spec.field.column()),
                None => {}
            }
        }

        if resolved.is_empty() {
            return Err(self
                .columns
                .first()
                .map(|c| c.field.column())
                .unwrap_or("<none>"));
        }
        Ok(resolved)
    }
}

/// Source spellings tried for a base alias, in priority order
fn spellings(base: &str) -> [String; 3] {
    [base.to_string(), format!("{}_2021", base), format!("{}21", base)]
}

fn find_column<'a, I>(aliases: &[&str], available: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    aliases.iter().flat_map(|alias| spellings(alias)).find_map(|candidate| {
        available
            .clone()
            .into_iter()
            .find(|name| name.eq_ignore_ascii_case(&candidate))
    })
}
