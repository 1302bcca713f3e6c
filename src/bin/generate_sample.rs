use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use parquet::arrow::ArrowWriter;

use health_trends::data::loader::{
    COUNTRY_COLUMN, INDICATOR_CODE_COLUMN, INDICATOR_NAME_COLUMN, VALUE_COLUMN, YEAR_COLUMN,
};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Indicator profile: name, code, value in the first year, yearly growth
/// factor, relative noise, first year with data.
struct Profile {
    name: &'static str,
    code: &'static str,
    start: f64,
    growth: f64,
    noise: f64,
    first_year: i64,
}

const PROFILES: &[Profile] = &[
    Profile {
        name: "Mortality rate, infant (per 1,000 live births)",
        code: "SP.DYN.IMRT.IN",
        start: 68.0,
        growth: 0.962,
        noise: 0.02,
        first_year: 1960,
    },
    Profile {
        name: "Life expectancy at birth, female (years)",
        code: "SP.DYN.LE00.FE.IN",
        start: 63.0,
        growth: 1.0035,
        noise: 0.003,
        first_year: 1960,
    },
    Profile {
        name: "Life expectancy at birth, male (years)",
        code: "SP.DYN.LE00.MA.IN",
        start: 61.0,
        growth: 1.0027,
        noise: 0.003,
        first_year: 1960,
    },
    Profile {
        name: "Current health expenditure (% of GDP)",
        code: "SH.XPD.CHEX.GD.ZS",
        start: 3.4,
        growth: 1.002,
        noise: 0.04,
        first_year: 2000,
    },
    Profile {
        name: "Incidence of tuberculosis (per 100,000 people)",
        code: "SH.TBS.INCD",
        start: 66.0,
        growth: 0.995,
        noise: 0.01,
        first_year: 2000,
    },
    Profile {
        name: "Prevalence of anemia among children (% of children ages 6-59 months)",
        code: "SH.ANM.CHLD.ZS",
        start: 45.0,
        growth: 0.985,
        noise: 0.02,
        first_year: 2000,
    },
    Profile {
        name: "Suicide mortality rate (per 100,000 population)",
        code: "SH.STA.SUIC.P5",
        start: 35.0,
        growth: 0.97,
        noise: 0.05,
        first_year: 2000,
    },
    // Not in any category; dropped by default when loading.
    Profile {
        name: "Number of surgical procedures (per 100,000 population)",
        code: "SH.SGR.PROC.P5",
        start: 3000.0,
        growth: 1.01,
        noise: 0.05,
        first_year: 2010,
    },
];

const LAST_YEAR: i64 = 2023;
const MISSING_RATE: f64 = 0.08;

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);

    let mut all_name: Vec<&str> = Vec::new();
    let mut all_code: Vec<&str> = Vec::new();
    let mut all_year: Vec<i64> = Vec::new();
    let mut all_value: Vec<Option<f64>> = Vec::new();

    for profile in PROFILES {
        let mut level = profile.start;
        for year in profile.first_year..=LAST_YEAR {
            let observed = level * (1.0 + rng.gauss(0.0, profile.noise));
            let value = (rng.next_f64() >= MISSING_RATE).then_some((observed * 100.0).round() / 100.0);

            all_name.push(profile.name);
            all_code.push(profile.code);
            all_year.push(year);
            all_value.push(value);

            level *= profile.growth;
        }
    }

    let n_rows = all_year.len();

    // Build Arrow arrays
    let country_array = StringArray::from(vec!["Sri Lanka"; n_rows]);
    let name_array = StringArray::from_iter_values(&all_name);
    let code_array = StringArray::from_iter_values(&all_code);
    let year_array = Int64Array::from_iter_values(all_year.iter().copied());
    let value_array: Float64Array = all_value.iter().copied().collect();

    let schema = Arc::new(Schema::new(vec![
        Field::new(COUNTRY_COLUMN, DataType::Utf8, false),
        Field::new(INDICATOR_NAME_COLUMN, DataType::Utf8, false),
        Field::new(INDICATOR_CODE_COLUMN, DataType::Utf8, false),
        Field::new(YEAR_COLUMN, DataType::Int64, false),
        Field::new(VALUE_COLUMN, DataType::Float64, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(country_array),
            Arc::new(name_array),
            Arc::new(code_array),
            Arc::new(year_array),
            Arc::new(value_array),
        ],
    )
    .context("building record batch")?;

    // Write Parquet
    let parquet_path = "sample_health.parquet";
    let file = std::fs::File::create(parquet_path).context("creating parquet output")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;

    // Write CSV with the same rows
    let csv_path = "sample_health.csv";
    let mut csv_writer = csv::Writer::from_path(csv_path).context("creating CSV output")?;
    csv_writer.write_record([
        COUNTRY_COLUMN,
        INDICATOR_NAME_COLUMN,
        INDICATOR_CODE_COLUMN,
        YEAR_COLUMN,
        VALUE_COLUMN,
    ])?;
    for i in 0..n_rows {
        let year = all_year[i].to_string();
        let value = all_value[i].map(|v| v.to_string()).unwrap_or_default();
        csv_writer.write_record(["Sri Lanka", all_name[i], all_code[i], year.as_str(), value.as_str()])?;
    }
    csv_writer.flush().context("flushing CSV output")?;

    println!("{}", pretty_format_batches(&[batch.slice(0, 5)])?);
    println!(
        "Wrote {n_rows} observations ({} indicators) to {parquet_path} and {csv_path}",
        PROFILES.len()
    );
    Ok(())
}
