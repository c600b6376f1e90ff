//! Measurement vectors and the static field table.
//!
//! Every node of a report carries a [`SensorValues`] vector. The set of
//! fields is closed: [`SensorField::ALL`] is the single list consulted by the
//! formatter, the formula evaluator and every option list.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Display unit of a measurement field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    None,
    /// Microseconds.
    Micros,
    /// Millijoules.
    Millijoules,
}

impl Unit {
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::None => "",
            Unit::Micros => "µs",
            Unit::Millijoules => "mJ",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One named field of a measurement vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorField {
    #[serde(rename = "profilerHits")]
    ProfilerHits,
    #[serde(rename = "selfCPUTime")]
    SelfCpuTime,
    #[serde(rename = "aggregatedCPUTime")]
    AggregatedCpuTime,
    #[serde(rename = "internCPUTime")]
    InternCpuTime,
    #[serde(rename = "externCPUTime")]
    ExternCpuTime,
    #[serde(rename = "langInternalCPUTime")]
    LangInternalCpuTime,
    #[serde(rename = "selfCPUEnergyConsumption")]
    SelfCpuEnergy,
    #[serde(rename = "aggregatedCPUEnergyConsumption")]
    AggregatedCpuEnergy,
    #[serde(rename = "internCPUEnergyConsumption")]
    InternCpuEnergy,
    #[serde(rename = "externCPUEnergyConsumption")]
    ExternCpuEnergy,
    #[serde(rename = "langInternalCPUEnergyConsumption")]
    LangInternalCpuEnergy,
    #[serde(rename = "selfRAMEnergyConsumption")]
    SelfRamEnergy,
    #[serde(rename = "aggregatedRAMEnergyConsumption")]
    AggregatedRamEnergy,
    #[serde(rename = "internRAMEnergyConsumption")]
    InternRamEnergy,
    #[serde(rename = "externRAMEnergyConsumption")]
    ExternRamEnergy,
    #[serde(rename = "langInternalRAMEnergyConsumption")]
    LangInternalRamEnergy,
}

/// Static description of a field: report name, unit and whether it is an
/// energy reading (those are rounded when displayed).
#[derive(Clone, Copy, Debug)]
pub struct FieldDescriptor {
    pub field: SensorField,
    pub name: &'static str,
    pub label: &'static str,
    pub unit: Unit,
    pub is_energy: bool,
}

const fn descriptor(
    field: SensorField,
    name: &'static str,
    label: &'static str,
    unit: Unit,
) -> FieldDescriptor {
    FieldDescriptor {
        field,
        name,
        label,
        unit,
        is_energy: matches!(unit, Unit::Millijoules),
    }
}

const DESCRIPTORS: [FieldDescriptor; SensorField::COUNT] = [
    descriptor(
        SensorField::ProfilerHits,
        "profilerHits",
        "Profiler hits",
        Unit::None,
    ),
    descriptor(
        SensorField::SelfCpuTime,
        "selfCPUTime",
        "Self CPU time",
        Unit::Micros,
    ),
    descriptor(
        SensorField::AggregatedCpuTime,
        "aggregatedCPUTime",
        "Aggregated CPU time",
        Unit::Micros,
    ),
    descriptor(
        SensorField::InternCpuTime,
        "internCPUTime",
        "Intern CPU time",
        Unit::Micros,
    ),
    descriptor(
        SensorField::ExternCpuTime,
        "externCPUTime",
        "Extern CPU time",
        Unit::Micros,
    ),
    descriptor(
        SensorField::LangInternalCpuTime,
        "langInternalCPUTime",
        "Language internal CPU time",
        Unit::Micros,
    ),
    descriptor(
        SensorField::SelfCpuEnergy,
        "selfCPUEnergyConsumption",
        "Self CPU energy",
        Unit::Millijoules,
    ),
    descriptor(
        SensorField::AggregatedCpuEnergy,
        "aggregatedCPUEnergyConsumption",
        "Aggregated CPU energy",
        Unit::Millijoules,
    ),
    descriptor(
        SensorField::InternCpuEnergy,
        "internCPUEnergyConsumption",
        "Intern CPU energy",
        Unit::Millijoules,
    ),
    descriptor(
        SensorField::ExternCpuEnergy,
        "externCPUEnergyConsumption",
        "Extern CPU energy",
        Unit::Millijoules,
    ),
    descriptor(
        SensorField::LangInternalCpuEnergy,
        "langInternalCPUEnergyConsumption",
        "Language internal CPU energy",
        Unit::Millijoules,
    ),
    descriptor(
        SensorField::SelfRamEnergy,
        "selfRAMEnergyConsumption",
        "Self RAM energy",
        Unit::Millijoules,
    ),
    descriptor(
        SensorField::AggregatedRamEnergy,
        "aggregatedRAMEnergyConsumption",
        "Aggregated RAM energy",
        Unit::Millijoules,
    ),
    descriptor(
        SensorField::InternRamEnergy,
        "internRAMEnergyConsumption",
        "Intern RAM energy",
        Unit::Millijoules,
    ),
    descriptor(
        SensorField::ExternRamEnergy,
        "externRAMEnergyConsumption",
        "Extern RAM energy",
        Unit::Millijoules,
    ),
    descriptor(
        SensorField::LangInternalRamEnergy,
        "langInternalRAMEnergyConsumption",
        "Language internal RAM energy",
        Unit::Millijoules,
    ),
];

impl SensorField {
    pub const COUNT: usize = 16;

    /// All fields in display order.
    pub const ALL: [SensorField; SensorField::COUNT] = [
        SensorField::ProfilerHits,
        SensorField::SelfCpuTime,
        SensorField::AggregatedCpuTime,
        SensorField::InternCpuTime,
        SensorField::ExternCpuTime,
        SensorField::LangInternalCpuTime,
        SensorField::SelfCpuEnergy,
        SensorField::AggregatedCpuEnergy,
        SensorField::InternCpuEnergy,
        SensorField::ExternCpuEnergy,
        SensorField::LangInternalCpuEnergy,
        SensorField::SelfRamEnergy,
        SensorField::AggregatedRamEnergy,
        SensorField::InternRamEnergy,
        SensorField::ExternRamEnergy,
        SensorField::LangInternalRamEnergy,
    ];

    /// Position of the field in [`SensorField::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn descriptor(self) -> &'static FieldDescriptor {
        &DESCRIPTORS[self.index()]
    }

    /// Name as it appears in reports and formulas, e.g. `selfCPUTime`.
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    pub fn unit(self) -> Unit {
        self.descriptor().unit
    }

    pub fn is_energy(self) -> bool {
        self.descriptor().is_energy
    }

    /// Look up a field by its report name. Case sensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        DESCRIPTORS.iter().find(|d| d.name == name).map(|d| d.field)
    }
}

impl fmt::Display for SensorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SensorField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorField::from_name(s).ok_or_else(|| format!("unknown measurement field '{}'", s))
    }
}

/// Measurement vector of one code unit.
///
/// Absent fields deserialize as 0. Reads go through [`SensorValues::get`],
/// which never returns a negative or non-finite number.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorValues {
    #[serde(rename = "profilerHits")]
    pub profiler_hits: f64,
    #[serde(rename = "selfCPUTime")]
    pub self_cpu_time: f64,
    #[serde(rename = "aggregatedCPUTime")]
    pub aggregated_cpu_time: f64,
    #[serde(rename = "internCPUTime")]
    pub intern_cpu_time: f64,
    #[serde(rename = "externCPUTime")]
    pub extern_cpu_time: f64,
    #[serde(rename = "langInternalCPUTime")]
    pub lang_internal_cpu_time: f64,
    #[serde(rename = "selfCPUEnergyConsumption")]
    pub self_cpu_energy: f64,
    #[serde(rename = "aggregatedCPUEnergyConsumption")]
    pub aggregated_cpu_energy: f64,
    #[serde(rename = "internCPUEnergyConsumption")]
    pub intern_cpu_energy: f64,
    #[serde(rename = "externCPUEnergyConsumption")]
    pub extern_cpu_energy: f64,
    #[serde(rename = "langInternalCPUEnergyConsumption")]
    pub lang_internal_cpu_energy: f64,
    #[serde(rename = "selfRAMEnergyConsumption")]
    pub self_ram_energy: f64,
    #[serde(rename = "aggregatedRAMEnergyConsumption")]
    pub aggregated_ram_energy: f64,
    #[serde(rename = "internRAMEnergyConsumption")]
    pub intern_ram_energy: f64,
    #[serde(rename = "externRAMEnergyConsumption")]
    pub extern_ram_energy: f64,
    #[serde(rename = "langInternalRAMEnergyConsumption")]
    pub lang_internal_ram_energy: f64,
}

impl SensorValues {
    fn slot(&self, field: SensorField) -> f64 {
        match field {
            SensorField::ProfilerHits => self.profiler_hits,
            SensorField::SelfCpuTime => self.self_cpu_time,
            SensorField::AggregatedCpuTime => self.aggregated_cpu_time,
            SensorField::InternCpuTime => self.intern_cpu_time,
            SensorField::ExternCpuTime => self.extern_cpu_time,
            SensorField::LangInternalCpuTime => self.lang_internal_cpu_time,
            SensorField::SelfCpuEnergy => self.self_cpu_energy,
            SensorField::AggregatedCpuEnergy => self.aggregated_cpu_energy,
            SensorField::InternCpuEnergy => self.intern_cpu_energy,
            SensorField::ExternCpuEnergy => self.extern_cpu_energy,
            SensorField::LangInternalCpuEnergy => self.lang_internal_cpu_energy,
            SensorField::SelfRamEnergy => self.self_ram_energy,
            SensorField::AggregatedRamEnergy => self.aggregated_ram_energy,
            SensorField::InternRamEnergy => self.intern_ram_energy,
            SensorField::ExternRamEnergy => self.extern_ram_energy,
            SensorField::LangInternalRamEnergy => self.lang_internal_ram_energy,
        }
    }

    fn slot_mut(&mut self, field: SensorField) -> &mut f64 {
        match field {
            SensorField::ProfilerHits => &mut self.profiler_hits,
            SensorField::SelfCpuTime => &mut self.self_cpu_time,
            SensorField::AggregatedCpuTime => &mut self.aggregated_cpu_time,
            SensorField::InternCpuTime => &mut self.intern_cpu_time,
            SensorField::ExternCpuTime => &mut self.extern_cpu_time,
            SensorField::LangInternalCpuTime => &mut self.lang_internal_cpu_time,
            SensorField::SelfCpuEnergy => &mut self.self_cpu_energy,
            SensorField::AggregatedCpuEnergy => &mut self.aggregated_cpu_energy,
            SensorField::InternCpuEnergy => &mut self.intern_cpu_energy,
            SensorField::ExternCpuEnergy => &mut self.extern_cpu_energy,
            SensorField::LangInternalCpuEnergy => &mut self.lang_internal_cpu_energy,
            SensorField::SelfRamEnergy => &mut self.self_ram_energy,
            SensorField::AggregatedRamEnergy => &mut self.aggregated_ram_energy,
            SensorField::InternRamEnergy => &mut self.intern_ram_energy,
            SensorField::ExternRamEnergy => &mut self.extern_ram_energy,
            SensorField::LangInternalRamEnergy => &mut self.lang_internal_ram_energy,
        }
    }

    /// Value of `field`, with negative and non-finite readings treated as 0.
    pub fn get(&self, field: SensorField) -> f64 {
        sanitize(self.slot(field))
    }

    pub fn set(&mut self, field: SensorField, value: f64) {
        *self.slot_mut(field) = sanitize(value);
    }

    /// Field-wise accumulate `other` into `self`.
    pub fn add_assign(&mut self, other: &SensorValues) {
        for field in SensorField::ALL {
            let sum = self.get(field) + other.get(field);
            self.set(field, sum);
        }
    }

    /// Field-wise sum of a sequence of vectors.
    pub fn sum<'a>(values: impl IntoIterator<Item = &'a SensorValues>) -> SensorValues {
        let mut total = SensorValues::default();
        for v in values {
            total.add_assign(v);
        }
        total
    }

    /// `true` when every field reads as 0.
    pub fn is_zero(&self) -> bool {
        SensorField::ALL.iter().all(|f| self.get(*f) == 0.0)
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_table_matches_enum_order() {
        for (idx, field) in SensorField::ALL.iter().enumerate() {
            assert_eq!(field.index(), idx);
            assert_eq!(field.descriptor().field, *field);
        }
    }

    #[test]
    fn lookup_by_report_name() {
        assert_eq!(
            SensorField::from_name("selfCPUTime"),
            Some(SensorField::SelfCpuTime)
        );
        assert_eq!(
            SensorField::from_name("langInternalRAMEnergyConsumption"),
            Some(SensorField::LangInternalRamEnergy)
        );
        assert_eq!(SensorField::from_name("selfcputime"), None);
        assert!("bogus".parse::<SensorField>().is_err());
    }

    #[test]
    fn units_and_energy_flags() {
        assert_eq!(SensorField::ProfilerHits.unit(), Unit::None);
        assert_eq!(SensorField::AggregatedCpuTime.unit(), Unit::Micros);
        assert!(SensorField::SelfRamEnergy.is_energy());
        assert!(!SensorField::ExternCpuTime.is_energy());
    }

    #[test]
    fn missing_fields_deserialize_as_zero() {
        let values: SensorValues =
            serde_json::from_str(r#"{"profilerHits": 4, "selfCPUEnergyConsumption": 0.25}"#)
                .expect("parse values");
        assert_eq!(values.get(SensorField::ProfilerHits), 4.0);
        assert_eq!(values.get(SensorField::SelfCpuEnergy), 0.25);
        assert_eq!(values.get(SensorField::AggregatedCpuTime), 0.0);
    }

    #[test]
    fn negative_and_nan_read_as_zero() {
        let values = SensorValues {
            self_cpu_time: -3.0,
            profiler_hits: f64::NAN,
            ..Default::default()
        };
        assert_eq!(values.get(SensorField::SelfCpuTime), 0.0);
        assert_eq!(values.get(SensorField::ProfilerHits), 0.0);
    }

    #[test]
    fn sum_is_field_wise() {
        let a = SensorValues {
            profiler_hits: 10.0,
            self_cpu_energy: 0.5,
            ..Default::default()
        };
        let b = SensorValues {
            profiler_hits: 20.0,
            self_cpu_energy: 0.25,
            ..Default::default()
        };
        let total = SensorValues::sum([&a, &b]);
        assert_eq!(total.get(SensorField::ProfilerHits), 30.0);
        assert_eq!(total.get(SensorField::SelfCpuEnergy), 0.75);
        assert!(!total.is_zero());
        assert!(SensorValues::default().is_zero());
    }
}
