//! Normalized region columns shared by every classification record.

/// A canonical output column.
///
/// The column set is additive: new layers append variants, existing
/// column names never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Sa1Code,
    Sa2Code,
    Sa2Name,
    Sa3Code,
    Sa3Name,
    Sa4Code,
    Sa4Name,
    GccsaCode,
    GccsaName,
    StateCode,
    StateName,
    IareCode,
    IareName,
    IregCode,
    IregName,
}

impl Field {
    pub fn all() -> &'static [Field] {
        &[
            Field::Sa1Code,
            Field::Sa2Code,
            Field::Sa2Name,
            Field::Sa3Code,
            Field::Sa3Name,
            Field::Sa4Code,
            Field::Sa4Name,
            Field::GccsaCode,
            Field::GccsaName,
            Field::StateCode,
            Field::StateName,
            Field::IareCode,
            Field::IareName,
            Field::IregCode,
            Field::IregName,
        ]
    }

    /// Output column name
    pub fn column(&self) -> &'static str {
        match self {
            Field::Sa1Code => "SA1_CODE",
            Field::Sa2Code => "SA2_CODE",
            Field::Sa2Name => "SA2_NAME",
            Field::Sa3Code => "SA3_CODE",
            Field::Sa3Name => "SA3_NAME",
            Field::Sa4Code => "SA4_CODE",
            Field::Sa4Name => "SA4_NAME",
            Field::GccsaCode => "GCCSA_CODE",
            Field::GccsaName => "GCCSA_NAME",
            Field::StateCode => "STATE_CODE",
            Field::StateName => "STATE_NAME",
            Field::IareCode => "IARE_CODE",
            Field::IareName => "IARE_NAME",
            Field::IregCode => "IREG_CODE",
            Field::IregName => "IREG_NAME",
        }
    }
}

/// Region codes and names resolved for one point.
///
/// Each field becomes its own CSV column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionFields {
    pub sa1_code: Option<String>,
    pub sa2_code: Option<String>,
    pub sa2_name: Option<String>,
    pub sa3_code: Option<String>,
    pub sa3_name: Option<String>,
    pub sa4_code: Option<String>,
    pub sa4_name: Option<String>,
    pub gccsa_code: Option<String>,
    pub gccsa_name: Option<String>,
    pub state_code: Option<String>,
    pub state_name: Option<String>,
    pub iare_code: Option<String>,
    pub iare_name: Option<String>,
    pub ireg_code: Option<String>,
    pub ireg_name: Option<String>,
}

impl RegionFields {
    fn slot_mut(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Sa1Code => &mut self.sa1_code,
            Field::Sa2Code => &mut self.sa2_code,
            Field::Sa2Name => &mut self.sa2_name,
            Field::Sa3Code => &mut self.sa3_code,
            Field::Sa3Name => &mut self.sa3_name,
            Field::Sa4Code => &mut self.sa4_code,
            Field::Sa4Name => &mut self.sa4_name,
            Field::GccsaCode => &mut self.gccsa_code,
            Field::GccsaName => &mut self.gccsa_name,
            Field::StateCode => &mut self.state_code,
            Field::StateName => &mut self.state_name,
            Field::IareCode => &mut self.iare_code,
            Field::IareName => &mut self.iare_name,
            Field::IregCode => &mut self.ireg_code,
            Field::IregName => &mut self.ireg_name,
        }
    }

    /// Set a field value
    pub fn set(&mut self, field: Field, value: String) {
        *self.slot_mut(field) = Some(value);
    }

    /// Get a field value
    pub fn get(&self, field: Field) -> Option<&str> {
        let slot = match field {
            Field::Sa1Code => &self.sa1_code,
            Field::Sa2Code => &self.sa2_code,
            Field::Sa2Name => &self.sa2_name,
            Field::Sa3Code => &self.sa3_code,
            Field::Sa3Name => &self.sa3_name,
            Field::Sa4Code => &self.sa4_code,
            Field::Sa4Name => &self.sa4_name,
            Field::GccsaCode => &self.gccsa_code,
            Field::GccsaName => &self.gccsa_name,
            Field::StateCode => &self.state_code,
            Field::StateName => &self.state_name,
            Field::IareCode => &self.iare_code,
            Field::IareName => &self.iare_name,
            Field::IregCode => &self.ireg_code,
            Field::IregName => &self.ireg_name,
        };
        slot.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        Field::all().iter().all(|f| self.get(*f).is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_round_through_every_field() {
        let mut fields = RegionFields::default();
        assert!(fields.is_empty());

        for field in Field::all() {
            fields.set(*field, field.column().to_lowercase());
        }
        for field in Field::all() {
            assert_eq!(fields.get(*field), Some(field.column().to_lowercase().as_str()));
        }
    }
}
