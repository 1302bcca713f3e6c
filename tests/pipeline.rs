//! End-to-end run over a small indicator table: load, classify, filter,
//! aggregate and forecast.

use std::io::Write;

use health_trends::data::loader::load_dataset;
use health_trends::prelude::*;

const IMR: &str = "Mortality rate, infant (per 1,000 live births)";
const LE_FEMALE: &str = "Life expectancy at birth, female (years)";
const LE_MALE: &str = "Life expectancy at birth, male (years)";

fn write_table() -> tempfile::NamedTempFile {
    let mut csv = String::from("Country Name,Indicator Name,Indicator Code,Year,Value\n");
    for (i, year) in (2010..=2019).enumerate() {
        let i = i as f64;
        csv.push_str(&format!("Sri Lanka,\"{IMR}\",SP.DYN.IMRT.IN,{year},{}\n", 10.0 - 0.5 * i));
        csv.push_str(&format!("Sri Lanka,\"{LE_FEMALE}\",SP.DYN.LE00.FE.IN,{year},{}\n", 78.0 + 0.2 * i));
        csv.push_str(&format!("Sri Lanka,\"{LE_MALE}\",SP.DYN.LE00.MA.IN,{year},\n"));
    }
    csv.push_str("Sri Lanka,Unlisted indicator,XX,2015,3\n");

    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(csv.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_filter_aggregate_forecast() {
    let file = write_table();
    let table = CategoryTable::builtin();
    let dataset = load_dataset(file.path(), &table, false).unwrap();

    // The unlisted indicator is classified "Other" and dropped.
    assert_eq!(dataset.len(), 30);
    assert_eq!(dataset.indicators.len(), 3);

    let criteria = FilterCriteria::spanning(&dataset);
    assert_eq!(criteria.years, YearRange::new(2010, 2019));
    assert_eq!(apply(&dataset.records, &criteria).len(), dataset.len());

    let life = apply(
        &dataset.records,
        &criteria
            .clone()
            .with_keyword("LIFE EXPECTANCY")
            .with_sort(SortOrder::Descending),
    );
    assert_eq!(life.len(), 20);
    assert_eq!(life[0].year, 2019);
    assert_eq!(life[0].indicator_name, LE_FEMALE);

    // The male series is entirely missing and produces no summary rows.
    let by_indicator = by_indicator_year(&life);
    assert_eq!(by_indicator.len(), 10);
    assert!(by_indicator.iter().all(|s| s.indicator_name == LE_FEMALE));

    let summaries = summarize_categories(&life, Statistic::Mean);
    assert_eq!(summaries.len(), 10);
    assert_eq!(summaries[0].category, "Population Health and Demographics");
    assert_eq!(summaries[0].indicators.len(), 1);

    let names: Vec<String> = [IMR, LE_FEMALE, LE_MALE].map(String::from).to_vec();
    let forecasts = forecast_indicators(&dataset.records, &names, &ForecastConfig::default());
    assert_eq!(forecasts.len(), 3);

    let imr = forecasts[0].outcome.as_ref().unwrap().result().unwrap();
    assert_eq!(imr.forecast.len(), 5);
    assert_eq!(imr.forecast[0].year, 2020);
    assert!(imr.forecast[4].value < imr.historical[9].value);
    assert!(imr.percent_change.unwrap() < 0.0);

    let female = forecasts[1].outcome.as_ref().unwrap().result().unwrap();
    assert!((female.forecast[4].value - (78.0 + 0.2 * 14.0)).abs() < 1e-6);

    assert!(matches!(
        forecasts[2].outcome,
        Ok(ForecastOutcome::InsufficientData { usable_years: 0 })
    ));
}

#[test]
fn test_custom_category_table() {
    let table = CategoryTable::from_json_str(&format!(
        r#"{{ "Child survival": ["{IMR}"], "Longevity": ["{LE_FEMALE}", "{LE_MALE}"] }}"#
    ))
    .unwrap();

    let file = write_table();
    let dataset = load_dataset(file.path(), &table, true).unwrap();
    assert_eq!(dataset.len(), 31);
    assert!(dataset.categories.contains(OTHER_CATEGORY));

    let longevity = apply(
        &dataset.records,
        &FilterCriteria::default().with_categories(["Longevity"]),
    );
    assert_eq!(longevity.len(), 20);

    let pies = by_category_year(&longevity);
    assert!(pies.iter().all(|p| p.category == "Longevity"));
    assert_eq!(pies.len(), 10);
}
