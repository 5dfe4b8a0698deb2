//! Assignment of recipes to the weeks of a freshly placed order.

use chrono::prelude::*;
use chrono::Duration;
use failure::Error as FailureError;
use rand::Rng;

use errors::*;
use models::*;

#[derive(Clone, Debug, PartialEq)]
pub struct AllocationRequest {
    pub order_id: OrderId,
    pub meals_per_week: i32,
    pub number_of_people: i32,
    pub due_amount: f64,
    pub start_date: NaiveDate,
}

/// In-place Fisher-Yates shuffle.
pub fn shuffle<T, R: Rng>(rng: &mut R, items: &mut [T]) {
    if items.len() < 2 {
        return;
    }
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0, i + 1);
        items.swap(i, j);
    }
}

pub fn delivery_date(start_date: NaiveDate, week: Week) -> NaiveDate {
    start_date + Duration::days(i64::from((week - 1) * 7))
}

/// Builds the mapping rows of all weeks of an order.
///
/// Every week gets `meals_per_week` recipes. Slots past the end of the pool wrap around to
/// its beginning, so a pool smaller than a whole order repeats recipes across weeks. The pool
/// is reshuffled between weeks.
pub fn allocate<R: Rng>(rng: &mut R, pool: &[PoolEntry], req: &AllocationRequest) -> Result<Vec<WeekMappingInserter>, FailureError> {
    if req.meals_per_week <= 0 {
        return Err(format_err!("meals_per_week must be positive, got {}", req.meals_per_week)
            .context(Error::Validation)
            .into());
    }
    let meals = req.meals_per_week as usize;
    if pool.len() < meals {
        return Err(format_err!(
            "Pool of {} recipes cannot fill {} meals per week",
            pool.len(),
            req.meals_per_week
        ).context(Error::InsufficientInventory)
            .into());
    }

    let mut shuffled = pool.to_vec();
    shuffle(rng, &mut shuffled);

    let mut out = Vec::with_capacity(meals * WEEKS_PER_ORDER as usize);
    for week in 1..=WEEKS_PER_ORDER {
        let date = delivery_date(req.start_date, week);
        for meal in 0..meals {
            let idx = ((week - 1) as usize * meals + meal) % shuffled.len();
            let entry = shuffled[idx];
            out.push(WeekMappingInserter {
                order_id: req.order_id,
                week,
                recipe_id: entry.recipe_id,
                recipe_price: entry.price,
                spice_level_id: DEFAULT_SPICE_LEVEL,
                delivery_date: date,
                number_of_people: req.number_of_people,
                meals_per_week: req.meals_per_week,
                due_amount: req.due_amount,
            });
        }
        shuffle(rng, &mut shuffled);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn rng() -> StdRng {
        StdRng::from_seed([7; 32])
    }

    fn pool(n: i32) -> Vec<PoolEntry> {
        (1..=n)
            .map(|i| PoolEntry {
                recipe_id: RecipeId(i),
                price: 10.0 + f64::from(i),
            })
            .collect()
    }

    fn request(meals_per_week: i32) -> AllocationRequest {
        AllocationRequest {
            order_id: OrderId(1),
            meals_per_week,
            number_of_people: 2,
            due_amount: 60.0,
            start_date: NaiveDate::from_ymd(2024, 3, 4),
        }
    }

    #[test]
    fn every_week_gets_requested_meals() {
        let rows = allocate(&mut rng(), &pool(5), &request(3)).unwrap();

        assert_eq!(rows.len(), 12);
        for week in 1..=WEEKS_PER_ORDER {
            let in_week = rows.iter().filter(|r| r.week == week).collect::<Vec<_>>();
            assert_eq!(in_week.len(), 3);
            assert!(in_week.iter().all(|r| r.delivery_date == delivery_date(request(3).start_date, week)));
        }
        let week3 = rows.iter().find(|r| r.week == 3).unwrap();
        assert_eq!(week3.delivery_date, NaiveDate::from_ymd(2024, 3, 18));
    }

    #[test]
    fn small_pool_wraps_around() {
        let rows = allocate(&mut rng(), &pool(3), &request(3)).unwrap();
        assert_eq!(rows.len(), 12);
        for week in 1..=WEEKS_PER_ORDER {
            let mut ids = rows.iter()
                .filter(|r| r.week == week)
                .map(|r| r.recipe_id)
                .collect::<Vec<_>>();
            ids.sort();
            // Each week of a pool-sized order uses the whole pool once.
            assert_eq!(ids, vec![RecipeId(1), RecipeId(2), RecipeId(3)]);
        }
    }

    #[test]
    fn rows_carry_pool_prices_and_defaults() {
        let rows = allocate(&mut rng(), &pool(4), &request(2)).unwrap();
        for row in rows {
            assert_eq!(row.recipe_price, 10.0 + f64::from(row.recipe_id.0));
            assert_eq!(row.spice_level_id, DEFAULT_SPICE_LEVEL);
            assert_eq!(row.number_of_people, 2);
            assert_eq!(row.due_amount, 60.0);
        }
    }

    #[test]
    fn same_seed_same_plan() {
        let a = allocate(&mut rng(), &pool(9), &request(3)).unwrap();
        let b = allocate(&mut rng(), &pool(9), &request(3)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn short_pool_is_insufficient_inventory() {
        let e = allocate(&mut rng(), &pool(2), &request(3)).unwrap_err();
        assert_eq!(error_kind(&e), Some(Error::InsufficientInventory));
    }

    #[test]
    fn zero_meals_is_rejected() {
        let e = allocate(&mut rng(), &pool(2), &request(0)).unwrap_err();
        assert_eq!(error_kind(&e), Some(Error::Validation));
    }

    #[test]
    fn shuffle_keeps_elements() {
        let mut items = (0..20).collect::<Vec<_>>();
        shuffle(&mut rng(), &mut items);
        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }
}
