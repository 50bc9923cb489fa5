//! Meter-value synthesis
//!
//! Each sample tick on an active transaction produces one meter value with
//! sampled-value entries for the connector's configured measurands. Energy
//! accumulation follows `max_power / (power_divider · 3600) · interval`;
//! voltage/power/current honor the station's phase layout.

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::error;

use super::connector::ConnectorState;
use crate::ocpp::{OcppError, OcppErrorCode};

/// Line-to-line sampling threshold: above this nominal voltage the phases
/// are reported L1-L2/L2-L3/L3-L1 instead of L-N.
const LINE_TO_LINE_THRESHOLD_V: f64 = 250.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampledMeasurand {
    EnergyActiveImportRegister,
    PowerActiveImport,
    CurrentImport,
    Voltage,
    StateOfCharge,
}

impl SampledMeasurand {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Energy.Active.Import.Register" => Some(Self::EnergyActiveImportRegister),
            "Power.Active.Import" => Some(Self::PowerActiveImport),
            "Current.Import" => Some(Self::CurrentImport),
            "Voltage" => Some(Self::Voltage),
            "SoC" | "State.Of.Charge" => Some(Self::StateOfCharge),
            _ => None,
        }
    }
}

/// One synthesized sampled value, version-neutral; the outbound builders
/// map it onto the 1.6 / 2.0.1 wire types.
#[derive(Debug, Clone)]
pub struct SyntheticSample {
    pub measurand: SampledMeasurand,
    pub value: f64,
    pub phase: Option<SamplePhase>,
    pub unit: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplePhase {
    L1,
    L2,
    L3,
    L1N,
    L2N,
    L3N,
    L1L2,
    L2L3,
    L3L1,
}

pub struct MeterSampler {
    pub max_power_w: f64,
    pub voltage_out: f64,
    pub number_of_phases: u32,
    pub power_divider: u32,
    pub measurands: Vec<SampledMeasurand>,
}

impl MeterSampler {
    pub fn new(
        max_power_w: f64,
        voltage_out: f64,
        number_of_phases: u32,
        power_divider: u32,
        measurand_names: &[String],
    ) -> Self {
        let mut measurands: Vec<SampledMeasurand> = measurand_names
            .iter()
            .filter_map(|name| SampledMeasurand::parse(name))
            .collect();
        if measurands.is_empty() {
            measurands.push(SampledMeasurand::EnergyActiveImportRegister);
        }
        Self {
            max_power_w,
            voltage_out,
            number_of_phases,
            power_divider,
            measurands,
        }
    }

    /// Advance the connector's energy register by one tick and synthesize
    /// the sampled values. A non-positive power divider means the station
    /// layout is broken; nothing is emitted then.
    pub fn sample(
        &self,
        connector: &mut ConnectorState,
        interval: Duration,
    ) -> Result<Vec<SyntheticSample>, OcppError> {
        if self.power_divider == 0 {
            error!(
                connector_id = connector.id,
                "Power divider is not positive, refusing to emit meter values"
            );
            return Err(OcppError::new(
                OcppErrorCode::InternalError,
                "power divider must be positive",
            ));
        }

        let connector_power_w = self.max_power_w / self.power_divider as f64;
        let energy_delta_wh = connector_power_w / 3600.0 * interval.as_secs_f64();
        connector.energy_active_import_register_wh += energy_delta_wh;

        let mut rng = rand::thread_rng();
        let mut samples = Vec::new();

        for measurand in &self.measurands {
            match measurand {
                SampledMeasurand::EnergyActiveImportRegister => {
                    samples.push(SyntheticSample {
                        measurand: *measurand,
                        value: round2(connector.energy_active_import_register_wh),
                        phase: None,
                        unit: "Wh",
                    });
                }
                SampledMeasurand::Voltage => {
                    let nominal = self.voltage_out;
                    if self.number_of_phases == 3 {
                        for phase in self.voltage_phases() {
                            samples.push(SyntheticSample {
                                measurand: *measurand,
                                value: round2(fluctuate(&mut rng, nominal, 0.1)),
                                phase: Some(phase),
                                unit: "V",
                            });
                        }
                    } else {
                        samples.push(SyntheticSample {
                            measurand: *measurand,
                            value: round2(fluctuate(&mut rng, nominal, 0.1)),
                            phase: None,
                            unit: "V",
                        });
                    }
                }
                SampledMeasurand::PowerActiveImport => {
                    let total = connector_power_w * rng.gen_range(0.8..=1.0);
                    if self.number_of_phases == 3 {
                        let per_phase = round2(total / 3.0);
                        for phase in [SamplePhase::L1, SamplePhase::L2, SamplePhase::L3] {
                            samples.push(SyntheticSample {
                                measurand: *measurand,
                                value: per_phase,
                                phase: Some(phase),
                                unit: "W",
                            });
                        }
                        // All-phases value is the exact phase sum.
                        samples.push(SyntheticSample {
                            measurand: *measurand,
                            value: round2(per_phase * 3.0),
                            phase: None,
                            unit: "W",
                        });
                    } else {
                        samples.push(SyntheticSample {
                            measurand: *measurand,
                            value: round2(total),
                            phase: None,
                            unit: "W",
                        });
                    }
                }
                SampledMeasurand::CurrentImport => {
                    let phases = self.number_of_phases.max(1) as f64;
                    let amps_total =
                        connector_power_w * rng.gen_range(0.8..=1.0) / self.voltage_out;
                    if self.number_of_phases == 3 {
                        let per_phase = round2(amps_total / phases);
                        for phase in [SamplePhase::L1, SamplePhase::L2, SamplePhase::L3] {
                            samples.push(SyntheticSample {
                                measurand: *measurand,
                                value: per_phase,
                                phase: Some(phase),
                                unit: "A",
                            });
                        }
                        samples.push(SyntheticSample {
                            measurand: *measurand,
                            value: round2(per_phase * 3.0),
                            phase: None,
                            unit: "A",
                        });
                    } else {
                        samples.push(SyntheticSample {
                            measurand: *measurand,
                            value: round2(amps_total),
                            phase: None,
                            unit: "A",
                        });
                    }
                }
                SampledMeasurand::StateOfCharge => {
                    let soc: f64 = rng.gen_range(0.0..=100.0);
                    samples.push(SyntheticSample {
                        measurand: *measurand,
                        value: round2(soc.min(100.0)),
                        phase: None,
                        unit: "Percent",
                    });
                }
            }
        }

        Ok(samples)
    }

    fn voltage_phases(&self) -> [SamplePhase; 3] {
        if self.voltage_out > LINE_TO_LINE_THRESHOLD_V {
            [SamplePhase::L1L2, SamplePhase::L2L3, SamplePhase::L3L1]
        } else {
            [SamplePhase::L1N, SamplePhase::L2N, SamplePhase::L3N]
        }
    }
}

fn fluctuate(rng: &mut impl Rng, nominal: f64, fraction: f64) -> f64 {
    rng.gen_range(nominal * (1.0 - fraction)..=nominal * (1.0 + fraction))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ── Wire mapping ───────────────────────────────────────────────

pub fn to_v16_meter_value(samples: &[SyntheticSample]) -> rust_ocpp::v1_6::types::MeterValue {
    use rust_ocpp::v1_6::types::{
        Measurand, MeterValue, Phase, ReadingContext, SampledValue, UnitOfMeasure,
    };

    let sampled_value = samples
        .iter()
        .map(|sample| SampledValue {
            value: format_sample_value(sample),
            context: Some(ReadingContext::SamplePeriodic),
            format: None,
            measurand: Some(match sample.measurand {
                SampledMeasurand::EnergyActiveImportRegister => {
                    Measurand::EnergyActiveImportRegister
                }
                SampledMeasurand::PowerActiveImport => Measurand::PowerActiveImport,
                SampledMeasurand::CurrentImport => Measurand::CurrentImport,
                SampledMeasurand::Voltage => Measurand::Voltage,
                SampledMeasurand::StateOfCharge => Measurand::SoC,
            }),
            phase: sample.phase.map(|phase| match phase {
                SamplePhase::L1 => Phase::L1,
                SamplePhase::L2 => Phase::L2,
                SamplePhase::L3 => Phase::L3,
                SamplePhase::L1N => Phase::L1N,
                SamplePhase::L2N => Phase::L2N,
                SamplePhase::L3N => Phase::L3N,
                SamplePhase::L1L2 => Phase::L1L2,
                SamplePhase::L2L3 => Phase::L2L3,
                SamplePhase::L3L1 => Phase::L3L1,
            }),
            location: None,
            unit: Some(match sample.unit {
                "Wh" => UnitOfMeasure::Wh,
                "W" => UnitOfMeasure::W,
                "A" => UnitOfMeasure::A,
                "V" => UnitOfMeasure::V,
                _ => UnitOfMeasure::Percent,
            }),
        })
        .collect();

    MeterValue {
        timestamp: Utc::now(),
        sampled_value,
    }
}

pub fn to_v201_meter_value(
    samples: &[SyntheticSample],
) -> rust_ocpp::v2_0_1::datatypes::meter_value_type::MeterValueType {
    use rust_ocpp::v2_0_1::datatypes::meter_value_type::MeterValueType;
    use rust_ocpp::v2_0_1::datatypes::sampled_value_type::SampledValueType;
    use rust_ocpp::v2_0_1::datatypes::unit_of_measure_type::UnitOfMeasureType;
    use rust_ocpp::v2_0_1::enumerations::measurand_enum_type::MeasurandEnumType;
    use rust_ocpp::v2_0_1::enumerations::phase_enum_type::PhaseEnumType;
    use rust_ocpp::v2_0_1::enumerations::reading_context_enum_type::ReadingContextEnumType;

    let sampled_value = samples
        .iter()
        .map(|sample| SampledValueType {
            value: Decimal::from_f64(round2(sample.value)).unwrap_or_default(),
            context: Some(ReadingContextEnumType::SamplePeriodic),
            measurand: Some(match sample.measurand {
                SampledMeasurand::EnergyActiveImportRegister => {
                    MeasurandEnumType::EnergyActiveImportRegister
                }
                SampledMeasurand::PowerActiveImport => MeasurandEnumType::PowerActiveImport,
                SampledMeasurand::CurrentImport => MeasurandEnumType::CurrentImport,
                SampledMeasurand::Voltage => MeasurandEnumType::Voltage,
                SampledMeasurand::StateOfCharge => MeasurandEnumType::SoC,
            }),
            phase: sample.phase.map(|phase| match phase {
                SamplePhase::L1 => PhaseEnumType::L1,
                SamplePhase::L2 => PhaseEnumType::L2,
                SamplePhase::L3 => PhaseEnumType::L3,
                SamplePhase::L1N => PhaseEnumType::L1N,
                SamplePhase::L2N => PhaseEnumType::L2N,
                SamplePhase::L3N => PhaseEnumType::L3N,
                SamplePhase::L1L2 => PhaseEnumType::L1L2,
                SamplePhase::L2L3 => PhaseEnumType::L2L3,
                SamplePhase::L3L1 => PhaseEnumType::L3L1,
            }),
            location: None,
            signed_meter_value: None,
            unit_of_measure: Some(UnitOfMeasureType {
                unit: Some(sample.unit.to_string()),
                multiplier: None,
            }),
        })
        .collect();

    MeterValueType {
        timestamp: Utc::now(),
        sampled_value,
    }
}

fn format_sample_value(sample: &SyntheticSample) -> String {
    if sample.measurand == SampledMeasurand::EnergyActiveImportRegister {
        // 1.6 energy registers are integral Wh.
        format!("{}", sample.value.round() as i64)
    } else {
        format!("{:.2}", sample.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler(measurands: &[&str]) -> MeterSampler {
        MeterSampler::new(
            22_000.0,
            230.0,
            3,
            2,
            &measurands.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
        )
    }

    #[test]
    fn energy_accumulates_per_tick() {
        let sampler = sampler(&["Energy.Active.Import.Register"]);
        let mut connector = ConnectorState::new(1);

        // 11 kW per connector for 60 s is 183.33 Wh.
        sampler
            .sample(&mut connector, Duration::from_secs(60))
            .unwrap();
        let first = connector.energy_active_import_register_wh;
        assert!((first - 183.33).abs() < 0.5, "got {first}");

        sampler
            .sample(&mut connector, Duration::from_secs(60))
            .unwrap();
        assert!(connector.energy_active_import_register_wh > first);
    }

    #[test]
    fn zero_divider_fails_without_emitting() {
        let mut sampler = sampler(&["Energy.Active.Import.Register"]);
        sampler.power_divider = 0;
        let mut connector = ConnectorState::new(1);
        assert!(sampler
            .sample(&mut connector, Duration::from_secs(60))
            .is_err());
        assert_eq!(connector.energy_active_import_register_wh, 0.0);
    }

    #[test]
    fn default_measurand_is_energy_register() {
        let sampler = MeterSampler::new(22_000.0, 230.0, 1, 1, &[]);
        assert_eq!(
            sampler.measurands,
            vec![SampledMeasurand::EnergyActiveImportRegister]
        );
    }

    #[test]
    fn three_phase_power_sums_to_all_phases_value() {
        let sampler = sampler(&["Power.Active.Import"]);
        let mut connector = ConnectorState::new(1);
        let samples = sampler
            .sample(&mut connector, Duration::from_secs(30))
            .unwrap();

        let phase_sum: f64 = samples
            .iter()
            .filter(|s| s.phase.is_some())
            .map(|s| s.value)
            .sum();
        let total = samples
            .iter()
            .find(|s| s.phase.is_none())
            .map(|s| s.value)
            .unwrap();
        assert!((phase_sum - total).abs() < 0.05, "{phase_sum} vs {total}");
    }

    #[test]
    fn voltage_stays_within_ten_percent_and_uses_ln_phases() {
        let sampler = sampler(&["Voltage"]);
        let mut connector = ConnectorState::new(1);
        let samples = sampler
            .sample(&mut connector, Duration::from_secs(30))
            .unwrap();
        assert_eq!(samples.len(), 3);
        for sample in &samples {
            assert!(sample.value >= 230.0 * 0.9 && sample.value <= 230.0 * 1.1);
            assert!(matches!(
                sample.phase,
                Some(SamplePhase::L1N) | Some(SamplePhase::L2N) | Some(SamplePhase::L3N)
            ));
        }
    }

    #[test]
    fn high_voltage_switches_to_line_to_line() {
        let sampler = MeterSampler::new(
            50_000.0,
            400.0,
            3,
            1,
            &["Voltage".to_string()],
        );
        let mut connector = ConnectorState::new(1);
        let samples = sampler
            .sample(&mut connector, Duration::from_secs(30))
            .unwrap();
        for sample in &samples {
            assert!(matches!(
                sample.phase,
                Some(SamplePhase::L1L2) | Some(SamplePhase::L2L3) | Some(SamplePhase::L3L1)
            ));
        }
    }

    #[test]
    fn soc_is_capped_at_100() {
        let sampler = sampler(&["SoC"]);
        let mut connector = ConnectorState::new(1);
        for _ in 0..32 {
            let samples = sampler
                .sample(&mut connector, Duration::from_secs(30))
                .unwrap();
            let soc = samples.last().unwrap();
            assert!(soc.value >= 0.0 && soc.value <= 100.0);
        }
    }

    #[test]
    fn v16_energy_value_is_integral() {
        let sample = SyntheticSample {
            measurand: SampledMeasurand::EnergyActiveImportRegister,
            value: 183.33,
            phase: None,
            unit: "Wh",
        };
        let meter_value = to_v16_meter_value(&[sample]);
        assert_eq!(meter_value.sampled_value[0].value, "183");
    }
}
