//! Revenue Aggregator Module
//! Joins orders, items and products and derives per-product revenue.

use crate::config::SellMeasure;
use polars::prelude::*;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// One row of the product revenue table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRevenue {
    pub product_id: String,
    pub sell_probability: f64,
    /// Mean item price.
    pub price: f64,
    pub total: f64,
}

pub struct RevenueAggregator;

impl RevenueAggregator {
    /// Orders ⋈ (items ⋈ products), inner joins throughout.
    pub fn join_order_items(
        orders: &DataFrame,
        items: &DataFrame,
        products: &DataFrame,
    ) -> LazyFrame {
        let items_product = items.clone().lazy().join(
            products.clone().lazy(),
            [col("product_id")],
            [col("product_id")],
            JoinArgs::new(JoinType::Inner),
        );
        orders.clone().lazy().join(
            items_product,
            [col("order_id")],
            [col("order_id")],
            JoinArgs::new(JoinType::Inner),
        )
    }

    /// Product revenue table sorted by `total` descending.
    ///
    /// Columns: product_id, sell_probability, price, total.
    pub fn product_revenue_frame(
        orders: &DataFrame,
        items: &DataFrame,
        products: &DataFrame,
        measure: SellMeasure,
    ) -> Result<DataFrame, AggregateError> {
        let (units, denominator) = match measure {
            SellMeasure::SequenceSum => (
                col("order_item_id").cast(DataType::Float64).sum(),
                len().cast(DataType::Float64),
            ),
            SellMeasure::ItemCount => (
                len().cast(DataType::Float64),
                col("units").sum(),
            ),
        };

        let df = Self::join_order_items(orders, items, products)
            .group_by([col("product_id")])
            .agg([
                units.alias("units"),
                col("price").cast(DataType::Float64).mean().alias("price"),
            ])
            // total uses the raw numerator, before it is normalised
            .with_columns([(col("units") * col("price")).alias("total")])
            .with_columns([(col("units") / denominator).alias("sell_probability")])
            .select([
                col("product_id"),
                col("sell_probability"),
                col("price"),
                col("total"),
            ])
            .sort(
                ["total", "product_id"],
                SortMultipleOptions::default()
                    .with_order_descending_multi([true, false])
                    .with_nulls_last(true),
            )
            .collect()?;
        Ok(df)
    }

    /// Product revenue rows, highest total first.
    pub fn product_revenue(
        orders: &DataFrame,
        items: &DataFrame,
        products: &DataFrame,
        measure: SellMeasure,
    ) -> Result<Vec<ProductRevenue>, AggregateError> {
        let df = Self::product_revenue_frame(orders, items, products, measure)?;

        let ids = df.column("product_id")?.str()?;
        let probability = df.column("sell_probability")?.f64()?;
        let price = df.column("price")?.f64()?;
        let total = df.column("total")?.f64()?;

        let rows = (0..df.height())
            .filter_map(|i| {
                Some(ProductRevenue {
                    product_id: ids.get(i)?.to_string(),
                    sell_probability: probability.get(i)?,
                    price: price.get(i).unwrap_or(f64::NAN),
                    total: total.get(i).unwrap_or(f64::NAN),
                })
            })
            .collect();
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> DataFrame {
        df!(
            "order_id" => ["o1", "o2", "o3", "o4"],
            "customer_id" => ["c1", "c2", "c3", "c4"],
        )
        .unwrap()
    }

    fn items() -> DataFrame {
        df!(
            "order_id" => ["o1", "o2", "o2", "o3", "o9", "o4"],
            "order_item_id" => [1i64, 1, 2, 1, 1, 1],
            "product_id" => ["p1", "p1", "p2", "p2", "p1", "ghost"],
            "price" => [10.0, 20.0, 5.0, 7.0, 99.0, 1.0],
        )
        .unwrap()
    }

    fn products() -> DataFrame {
        df!(
            "product_id" => ["p1", "p2", "p3"],
            "product_category_name" => ["toys", "books", "garden"],
        )
        .unwrap()
    }

    fn find<'a>(rows: &'a [ProductRevenue], id: &str) -> &'a ProductRevenue {
        rows.iter().find(|r| r.product_id == id).unwrap()
    }

    #[test]
    fn single_order_single_item() {
        let orders = df!("order_id" => ["1"], "customer_id" => ["c"]).unwrap();
        let items = df!(
            "order_id" => ["1"],
            "order_item_id" => [1i64],
            "product_id" => ["p1"],
            "price" => [10i64],
        )
        .unwrap();
        let products = df!("product_id" => ["p1"]).unwrap();

        let rows =
            RevenueAggregator::product_revenue(&orders, &items, &products, SellMeasure::SequenceSum)
                .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].product_id, "p1");
        assert_eq!(rows[0].sell_probability, 1.0);
        assert_eq!(rows[0].price, 10.0);
        assert_eq!(rows[0].total, 10.0);
    }

    #[test]
    fn join_drops_unknown_products_and_orders() {
        let joined = RevenueAggregator::join_order_items(&orders(), &items(), &products())
            .collect()
            .unwrap();

        // "ghost" has no product row, "o9" has no order row
        assert_eq!(joined.height(), 4);
        let known = products();
        let known_ids = known.column("product_id").unwrap().str().unwrap();
        for id in joined.column("product_id").unwrap().str().unwrap().into_iter().flatten() {
            assert!(known_ids.into_iter().flatten().any(|k| k == id));
        }
    }

    #[test]
    fn sequence_sum_mode_divides_by_product_count() {
        let rows = RevenueAggregator::product_revenue(
            &orders(),
            &items(),
            &products(),
            SellMeasure::SequenceSum,
        )
        .unwrap();

        assert_eq!(rows.len(), 2);
        // p1: item ids 1 + 1, mean price 15
        let p1 = find(&rows, "p1");
        assert_eq!(p1.sell_probability, 1.0);
        assert_eq!(p1.price, 15.0);
        assert_eq!(p1.total, 30.0);
        // p2: item ids 2 + 1, mean price 6
        let p2 = find(&rows, "p2");
        assert_eq!(p2.sell_probability, 1.5);
        assert_eq!(p2.total, 18.0);
    }

    #[test]
    fn item_count_mode_sums_to_one() {
        let rows = RevenueAggregator::product_revenue(
            &orders(),
            &items(),
            &products(),
            SellMeasure::ItemCount,
        )
        .unwrap();

        let sum: f64 = rows.iter().map(|r| r.sell_probability).sum();
        assert!((sum - 1.0).abs() < 1e-12);
        for row in &rows {
            assert!((0.0..=1.0).contains(&row.sell_probability));
        }
        assert_eq!(find(&rows, "p1").total, 30.0);
        assert_eq!(find(&rows, "p2").total, 12.0);
    }

    #[test]
    fn rows_are_sorted_by_total_descending() {
        let rows = RevenueAggregator::product_revenue(
            &orders(),
            &items(),
            &products(),
            SellMeasure::SequenceSum,
        )
        .unwrap();
        assert!(rows.windows(2).all(|w| w[0].total >= w[1].total));
        assert_eq!(rows[0].product_id, "p1");
    }

    #[test]
    fn no_matching_products_gives_empty_table() {
        let products = df!("product_id" => ["zzz"]).unwrap();
        let rows = RevenueAggregator::product_revenue(
            &orders(),
            &items(),
            &products,
            SellMeasure::SequenceSum,
        )
        .unwrap();
        assert!(rows.is_empty());
    }
}
