//! Stockroom database schema.

/// SQL to create the two relations and their indexes.
pub const CREATE_SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS materials (
    id            TEXT PRIMARY KEY,
    barcode       TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    specification TEXT NOT NULL DEFAULT '',
    unit          TEXT NOT NULL,
    current_stock INTEGER NOT NULL DEFAULT 0,
    min_stock     INTEGER NOT NULL DEFAULT 0,
    max_stock     INTEGER NOT NULL,
    location      TEXT NOT NULL DEFAULT '',
    category      TEXT NOT NULL DEFAULT '',
    description   TEXT NOT NULL DEFAULT '',
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS operations (
    seq              INTEGER PRIMARY KEY AUTOINCREMENT,
    id               TEXT NOT NULL UNIQUE,
    material_id      TEXT NOT NULL,
    material_barcode TEXT NOT NULL,
    material_name    TEXT NOT NULL,
    kind             TEXT NOT NULL,
    quantity         INTEGER NOT NULL,
    previous_stock   INTEGER NOT NULL,
    current_stock    INTEGER NOT NULL,
    operator         TEXT NOT NULL,
    reason           TEXT,
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_materials_category
    ON materials (category);

CREATE INDEX IF NOT EXISTS idx_materials_location
    ON materials (location);

CREATE INDEX IF NOT EXISTS idx_operations_material
    ON operations (material_id, seq);

CREATE INDEX IF NOT EXISTS idx_operations_created
    ON operations (created_at);
";
