use calamine::{open_workbook_auto, DataType, Range, Reader};
use coaching_tracker::builder::SheetBuilder;

use crate::tracker::io_common::{cell_from_calamine, header_name, simplify_file_name};
use crate::tracker::*;

/// Reads a worksheet (the first one by default). The first row holds the
/// column names.
pub fn read_excel_sheet(path: &str, worksheet: Option<&str>) -> TrackerResult<Sheet> {
    let wrange = get_range(path, worksheet)?;
    let source = simplify_file_name(path);

    let mut iter = wrange.rows();
    let header = match iter.next() {
        Some(h) => h,
        None => {
            warn!("read_excel_sheet: {}: empty worksheet", path);
            return Ok(SheetBuilder::with_headers(&source, Vec::new()).build());
        }
    };
    let headers: Vec<String> = header
        .iter()
        .map(|c| header_name(&cell_from_calamine(c)))
        .collect();
    debug!("read_excel_sheet: header: {:?}", headers);

    let mut builder = SheetBuilder::with_headers(&source, headers);
    for row in iter {
        builder.add_row(row.iter().map(cell_from_calamine).collect());
    }
    debug!("read_excel_sheet: {}: {} rows", path, builder.num_rows());
    Ok(builder.build())
}

fn get_range(path: &str, worksheet: Option<&str>) -> TrackerResult<Range<DataType>> {
    debug!("get_range: path: {:?} worksheet: {:?}", path, worksheet);
    let mut workbook = open_workbook_auto(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(worksheet_name) = worksheet {
        workbook
            .worksheet_range(worksheet_name)
            .context(MissingWorksheetSnafu {
                path,
                worksheet: worksheet_name,
            })?
            .context(OpeningExcelSnafu { path })
    } else {
        let names = workbook.sheet_names().to_vec();
        let first = names.first().context(EmptyExcelSnafu { path })?;
        debug!("get_range: path: {:?} using worksheet {:?}", path, first);
        workbook
            .worksheet_range(first)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })
    }
}
