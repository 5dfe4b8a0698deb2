use errors::*;
use repos::PgPool;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS customer (
        customer_id SERIAL PRIMARY KEY,
        email       VARCHAR NOT NULL UNIQUE,
        first_name  VARCHAR NOT NULL,
        last_name   VARCHAR NOT NULL
    );

    CREATE TABLE IF NOT EXISTS categories (
        category_id   SERIAL PRIMARY KEY,
        category_name VARCHAR NOT NULL
    );

    CREATE TABLE IF NOT EXISTS recipes (
        recipe_id   SERIAL PRIMARY KEY,
        category_id INTEGER NOT NULL REFERENCES categories (category_id),
        title       VARCHAR NOT NULL,
        price       DOUBLE PRECISION NOT NULL,
        image_url   VARCHAR
    );

    CREATE TABLE IF NOT EXISTS spicelevels (
        spice_level_id   SERIAL PRIMARY KEY,
        spice_level_name VARCHAR NOT NULL
    );

    CREATE TABLE IF NOT EXISTS snacks (
        snacks_id SERIAL PRIMARY KEY,
        name      VARCHAR NOT NULL,
        price     DOUBLE PRECISION NOT NULL
    );

    CREATE TABLE IF NOT EXISTS orderdetails (
        order_id            SERIAL PRIMARY KEY,
        customer_id         INTEGER NOT NULL REFERENCES customer (customer_id),
        order_type          VARCHAR(1) NOT NULL DEFAULT 'S',
        active_week         INTEGER NOT NULL DEFAULT 1,
        amount_paid         DOUBLE PRECISION NOT NULL,
        selected_recipes    INTEGER[] NOT NULL,
        subscription_id     VARCHAR,
        subscription_status VARCHAR(1),
        initial_payment_id  VARCHAR,
        created_at          TIMESTAMPTZ NOT NULL DEFAULT now()
    );

    CREATE INDEX IF NOT EXISTS orderdetails_customer_idx ON orderdetails (customer_id);
    CREATE INDEX IF NOT EXISTS orderdetails_subscription_idx ON orderdetails (subscription_id);

    CREATE TABLE IF NOT EXISTS orderrecipemapping (
        mapping_id       SERIAL PRIMARY KEY,
        order_id         INTEGER NOT NULL REFERENCES orderdetails (order_id),
        week             INTEGER NOT NULL CHECK (week BETWEEN 1 AND 4),
        recipe_id        INTEGER NOT NULL REFERENCES recipes (recipe_id),
        recipe_price     DOUBLE PRECISION NOT NULL,
        spice_level_id   INTEGER NOT NULL DEFAULT 2,
        delivery_date    DATE NOT NULL,
        number_of_people INTEGER NOT NULL,
        meals_per_week   INTEGER NOT NULL,
        payment_id       VARCHAR,
        payment_date     TIMESTAMP,
        paid_amount      DOUBLE PRECISION,
        due_amount       DOUBLE PRECISION NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS orderrecipemapping_order_week_idx ON orderrecipemapping (order_id, week);

    CREATE TABLE IF NOT EXISTS snacks_mapping (
        snacks_mapping_id SERIAL PRIMARY KEY,
        order_id          INTEGER NOT NULL REFERENCES orderdetails (order_id),
        week              INTEGER NOT NULL CHECK (week BETWEEN 1 AND 4),
        snacks_id         INTEGER NOT NULL REFERENCES snacks (snacks_id),
        snacks_price      DOUBLE PRECISION NOT NULL,
        portion           INTEGER NOT NULL,
        due_amount        DOUBLE PRECISION NOT NULL,
        payment_id        VARCHAR,
        paid_amount       DOUBLE PRECISION
    );

    CREATE TABLE IF NOT EXISTS order_week_snacks (
        order_id          INTEGER NOT NULL REFERENCES orderdetails (order_id),
        week              INTEGER NOT NULL,
        snacks_mapping_id INTEGER NOT NULL REFERENCES snacks_mapping (snacks_mapping_id) ON DELETE CASCADE,

        PRIMARY KEY (order_id, week, snacks_mapping_id)
    );
";

/// Creates every table the services read or write, leaving existing ones alone.
pub fn run(db_pool: &PgPool) -> RepoResult<()> {
    info!("Applying database migrations");
    db_pool.batch_execute(SCHEMA)
}
