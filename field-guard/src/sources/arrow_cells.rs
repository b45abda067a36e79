use arrow::array::{
    Array, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array,
    Int8Array, LargeStringArray, StringArray, StringViewArray, UInt16Array, UInt32Array,
    UInt64Array, UInt8Array,
};
use arrow::util::display::array_value_to_string;

use crate::dataset::CellValue;
use crate::error::Result;

macro_rules! cells_from {
    ($array:expr, $ty:ty, $convert:expr) => {
        if let Some(arr) = $array.as_any().downcast_ref::<$ty>() {
            return Ok((0..arr.len())
                .map(|i| {
                    if arr.is_null(i) {
                        CellValue::Missing
                    } else {
                        $convert(arr.value(i))
                    }
                })
                .collect());
        }
    };
}

/// Converts one Arrow array into engine cells; nulls become [`CellValue::Missing`].
///
/// Types without a dedicated mapping (dates, timestamps, decimals, ...) are rendered
/// with Arrow's display formatter and left for type inference to classify.
pub fn array_to_cells(array: &dyn Array) -> Result<Vec<CellValue>> {
    cells_from!(array, StringArray, |v: &str| CellValue::Text(v.to_string()));
    cells_from!(array, LargeStringArray, |v: &str| CellValue::Text(v.to_string()));
    cells_from!(array, StringViewArray, |v: &str| CellValue::Text(v.to_string()));
    cells_from!(array, BooleanArray, CellValue::Bool);
    cells_from!(array, Int8Array, |v: i8| CellValue::Int(i64::from(v)));
    cells_from!(array, Int16Array, |v: i16| CellValue::Int(i64::from(v)));
    cells_from!(array, Int32Array, |v: i32| CellValue::Int(i64::from(v)));
    cells_from!(array, Int64Array, CellValue::Int);
    cells_from!(array, UInt8Array, |v: u8| CellValue::Int(i64::from(v)));
    cells_from!(array, UInt16Array, |v: u16| CellValue::Int(i64::from(v)));
    cells_from!(array, UInt32Array, |v: u32| CellValue::Int(i64::from(v)));
    cells_from!(array, UInt64Array, |v: u64| match i64::try_from(v) {
        Ok(i) => CellValue::Int(i),
        Err(_) => CellValue::Float(v as f64),
    });
    cells_from!(array, Float32Array, |v: f32| CellValue::Float(f64::from(v)));
    cells_from!(array, Float64Array, CellValue::Float);

    let mut cells = Vec::with_capacity(array.len());
    for i in 0..array.len() {
        if array.is_null(i) {
            cells.push(CellValue::Missing);
        } else {
            cells.push(CellValue::Text(array_value_to_string(array, i)?));
        }
    }
    Ok(cells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Date32Array;

    #[test]
    fn test_numeric_and_boolean_arrays() {
        let ints = Int16Array::from(vec![Some(1), None, Some(-3)]);
        assert_eq!(
            array_to_cells(&ints).unwrap(),
            vec![CellValue::Int(1), CellValue::Missing, CellValue::Int(-3)]
        );

        let big = UInt64Array::from(vec![u64::MAX]);
        assert!(matches!(array_to_cells(&big).unwrap()[0], CellValue::Float(_)));

        let flags = BooleanArray::from(vec![Some(true), None]);
        assert_eq!(
            array_to_cells(&flags).unwrap(),
            vec![CellValue::Bool(true), CellValue::Missing]
        );
    }

    #[test]
    fn test_fallback_uses_display_formatting() {
        // 2024-01-01 is day 19723 since the epoch
        let dates = Date32Array::from(vec![Some(19723), None]);
        let cells = array_to_cells(&dates).unwrap();
        assert_eq!(cells[0], CellValue::Text("2024-01-01".to_string()));
        assert_eq!(cells[1], CellValue::Missing);
    }
}
