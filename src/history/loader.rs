//! Load historical actuals from the exported "Financial Model Structure" sheet
//!
//! The sheet is wide: a `Period` column of line-item labels followed by one column
//! per fiscal year. Labels are matched after trimming the indentation the sheet uses
//! for sub-items. Any missing required cell fails the load.

use super::data::{HistoricalData, HistoricalYear};
use crate::error::{ModelError, ModelResult};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Default path to the historical financials export
pub const DEFAULT_HISTORY_PATH: &str = "data/historical_financials.csv";

/// Label -> value per year column
struct WideTable {
    years: Vec<i32>,
    rows: HashMap<String, Vec<Option<f64>>>,
}

impl WideTable {
    fn value(&self, label: &str, col: usize) -> Option<f64> {
        self.rows.get(label).and_then(|values| values.get(col).copied().flatten())
    }

    fn required(&self, label: &str, col: usize) -> ModelResult<f64> {
        self.value(label, col).ok_or_else(|| ModelError::MissingHistoricalItem {
            item: label.to_string(),
            year: self.years[col],
        })
    }
}

/// Parse a spreadsheet cell: thousands separators, currency symbols and
/// accounting-style parentheses are accepted. Blank cells are `None`.
fn parse_cell(raw: &str) -> Result<Option<f64>, ()> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ',' | '£' | '$' | ' '))
        .collect();
    if cleaned.is_empty() || cleaned == "-" || cleaned.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let (negative, digits) = match cleaned.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, cleaned.as_str()),
    };
    let value: f64 = digits.parse().map_err(|_| ())?;
    Ok(Some(if negative { -value } else { value }))
}

fn read_wide_table<R: Read>(reader: R) -> ModelResult<WideTable> {
    let mut csv_reader = ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let years = headers
        .iter()
        .skip(1)
        .map(|h| {
            h.trim().parse::<i32>().map_err(|_| {
                ModelError::MalformedHistory(format!("column header '{}' is not a fiscal year", h))
            })
        })
        .collect::<ModelResult<Vec<i32>>>()?;

    if years.is_empty() {
        return Err(ModelError::MalformedHistory("no fiscal year columns".to_string()));
    }

    let mut rows = HashMap::new();
    for result in csv_reader.records() {
        let record = result?;
        let label = record.get(0).unwrap_or_default().trim().to_string();
        if label.is_empty() {
            continue;
        }
        let mut values = Vec::with_capacity(years.len());
        for (col, year) in years.iter().enumerate() {
            let raw = record.get(col + 1).unwrap_or_default();
            let value = parse_cell(raw).map_err(|_| ModelError::InvalidHistoricalValue {
                item: label.clone(),
                column: year.to_string(),
                value: raw.to_string(),
            })?;
            values.push(value);
        }
        rows.insert(label, values);
    }

    Ok(WideTable { years, rows })
}

fn year_from_table(table: &WideTable, col: usize) -> ModelResult<HistoricalYear> {
    let year = table.years[col];
    let req = |label: &str| table.required(label, col);

    let revenue = req("Revenue")?;
    let gross_profit = req("Gross Profit")?;
    let opex_total = -req("Operating Expenses")?.abs();
    let employees = req("Employee Numbers")?;

    if revenue < 0.0 {
        return Err(ModelError::MalformedHistory(format!("negative revenue in {}", year)));
    }
    if employees < 0.0 {
        return Err(ModelError::MalformedHistory(format!("negative headcount in {}", year)));
    }

    let per_employee = |total: f64| if employees > 0.0 { total / employees } else { 0.0 };
    let total_assets = req("Total Assets")?;
    let total_liabilities = req("Total Liabilities")?.abs();

    Ok(HistoricalYear {
        year,
        revenue,
        gross_profit,
        gross_margin: table
            .value("Gross Margin %", col)
            .unwrap_or(if revenue > 0.0 { gross_profit / revenue } else { 0.0 }),
        product_dev: -req("Product Development")?.abs(),
        sales_marketing: -req("Sales & Marketing")?.abs(),
        customer_success: -req("Customer Success")?.abs(),
        ga: -req("G&A")?.abs(),
        opex_total,
        ebitda: req("EBITDA")?,
        interest: req("Interest Payable")?,
        da: req("DA")?,
        exceptional_items: table.value("Exceptional Items", col).unwrap_or(0.0),
        tax: req("Tax")?,
        net_income: req("Net Income")?,
        operating_cf: req("Operating Cash Flow")?,
        investing_cf: req("Investing Cash Flow")?,
        financing_cf: req("Financing Cash Flow")?,
        net_change_in_cash: req("Net Change in Cash")?,
        cash_bf: req("Cash Balance b/f")?,
        cash_cf: req("Cash Balance c/f")?,
        total_assets,
        total_liabilities,
        net_assets: table
            .value("Net Assets", col)
            .unwrap_or(total_assets - total_liabilities),
        employees,
        arr: table.value("ARR", col),
        revenue_per_employee: table
            .value("Revenue per Employee", col)
            .unwrap_or_else(|| per_employee(revenue)),
        opex_per_employee: table
            .value("Opex per Employee", col)
            .unwrap_or_else(|| per_employee(opex_total)),
    })
}

/// Load historical actuals from a CSV file
pub fn load_history<P: AsRef<Path>>(path: P) -> ModelResult<HistoricalData> {
    let file = File::open(path.as_ref())?;
    let data = load_history_from_reader(file)?;
    log::info!(
        "Loaded {} historical years from {} (base year {})",
        data.years().len(),
        path.as_ref().display(),
        data.base_year().year
    );
    Ok(data)
}

/// Load historical actuals from any reader (e.g., string buffer, network stream)
pub fn load_history_from_reader<R: Read>(reader: R) -> ModelResult<HistoricalData> {
    let table = read_wide_table(reader)?;
    let years = (0..table.years.len())
        .map(|col| year_from_table(&table, col))
        .collect::<ModelResult<Vec<_>>>()?;
    Ok(HistoricalData::new(years))
}

/// Load historical actuals from the default location
pub fn load_default_history() -> ModelResult<HistoricalData> {
    load_history(DEFAULT_HISTORY_PATH)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A two-year export in the sheet's layout, used by tests across the crate
    pub(crate) const SAMPLE_CSV: &str = "\
Period,2023,2024
Revenue,\"5,050,000\",\"6,590,000\"
Gross Profit,4786000,6260500
Gross Margin %,0.9477,0.95
Operating Expenses,(14400000),(12600000)
  Product Development,-6900000,-6048000
  Sales & Marketing,-3600000,-3402000
  Customer Success,-1440000,-1260000
  G&A,-2460000,-1890000
EBITDA,-9614000,-6339500
Interest Payable,0,-160000
DA,-101000,-131800
Exceptional Items,-9300000,0
Tax,350000,420000
Net Income,-18665000,-6211300
Operating Cash Flow,-9100000,-6050000
Investing Cash Flow,-101000,-131800
Financing Cash Flow,0,6000000
Net Change in Cash,-9201000,-181800
Cash Balance b/f,16500000,7299000
Cash Balance c/f,7299000,7117200
Total Assets,11400000,11950000
Total Liabilities,-11700000,-17850000
Net Assets,-300000,-5900000
Employee Numbers,130,112
ARR,5360000,8100000
Revenue per Employee,38846,58839
Opex per Employee,-110769,-112500
";

    #[test]
    fn test_load_sample_history() {
        let data = load_history_from_reader(SAMPLE_CSV.as_bytes()).expect("sample should load");
        assert_eq!(data.years().len(), 2);

        let base = data.base_year();
        assert_eq!(base.year, 2024);
        assert_eq!(base.revenue, 6_590_000.0);
        assert_eq!(base.opex_total, -12_600_000.0);
        assert_eq!(base.sales_marketing, -3_402_000.0);
        assert_eq!(base.total_liabilities, 17_850_000.0);
        assert_eq!(base.arr, Some(8_100_000.0));
        assert_eq!(data.get(2023).map(|y| y.opex_total), Some(-14_400_000.0));
    }

    #[test]
    fn test_missing_line_item_fails_fast() {
        let csv = SAMPLE_CSV.replace("EBITDA,-9614000,-6339500\n", "");
        match load_history_from_reader(csv.as_bytes()) {
            Err(ModelError::MissingHistoricalItem { item, year }) => {
                assert_eq!(item, "EBITDA");
                assert_eq!(year, 2023);
            }
            other => panic!("expected missing item error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_cell_rejected() {
        let csv = SAMPLE_CSV.replace("Tax,350000,420000", "Tax,350000,tbc");
        assert!(matches!(
            load_history_from_reader(csv.as_bytes()),
            Err(ModelError::InvalidHistoricalValue { .. })
        ));
    }

    #[test]
    fn test_blank_arr_is_optional() {
        let csv = SAMPLE_CSV.replace("ARR,5360000,8100000", "ARR,,8100000");
        let data = load_history_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(data.get(2023).and_then(|y| y.arr), None);
    }

    #[test]
    fn test_non_year_header_rejected() {
        let csv = SAMPLE_CSV.replacen("Period,2023,2024", "Period,FY23,2024", 1);
        assert!(matches!(
            load_history_from_reader(csv.as_bytes()),
            Err(ModelError::MalformedHistory(_))
        ));
    }

    #[test]
    fn test_parse_cell_formats() {
        assert_eq!(parse_cell("(1,234)"), Ok(Some(-1234.0)));
        assert_eq!(parse_cell("£2,000"), Ok(Some(2000.0)));
        assert_eq!(parse_cell("  "), Ok(None));
        assert!(parse_cell("abc").is_err());
    }
}
