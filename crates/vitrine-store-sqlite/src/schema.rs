//! SQL schema for the Vitrine SQLite store.
//!
//! Column names must match the field names declared in
//! `vitrine_core::schema`; the store builds its statements from those tables.
//! Every entity table carries the same six audit columns.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    phone       TEXT,
    username    TEXT NOT NULL,
    password    TEXT NOT NULL,     -- argon2 PHC string
    role        TEXT NOT NULL DEFAULT 'user'
                CHECK (role IN ('user', 'staff', 'admin')),
    status      INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL,
    created_by  INTEGER,
    edited_at   TEXT,
    edited_by   INTEGER,
    deleted_at  TEXT,
    deleted_by  INTEGER
);

-- Soft-deleted accounts release their username and phone.
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_username_live
    ON users(username) WHERE deleted_at IS NULL;
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_phone_live
    ON users(phone) WHERE deleted_at IS NULL AND phone IS NOT NULL;

CREATE TABLE IF NOT EXISTS products (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    image        TEXT,
    title        TEXT NOT NULL,
    description  TEXT,
    type_product TEXT,
    price        REAL,
    status       INTEGER NOT NULL DEFAULT 1,
    created_at   TEXT NOT NULL,
    created_by   INTEGER,
    edited_at    TEXT,
    edited_by    INTEGER,
    deleted_at   TEXT,
    deleted_by   INTEGER
);

CREATE TABLE IF NOT EXISTS carousel (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    image       TEXT,
    title       TEXT NOT NULL,
    description TEXT,
    status      INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL,
    created_by  INTEGER,
    edited_at   TEXT,
    edited_by   INTEGER,
    deleted_at  TEXT,
    deleted_by  INTEGER
);

CREATE TABLE IF NOT EXISTS portfolio_images (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    image       TEXT,
    created_at  TEXT NOT NULL,
    created_by  INTEGER,
    edited_at   TEXT,
    edited_by   INTEGER,
    deleted_at  TEXT,
    deleted_by  INTEGER
);

CREATE TABLE IF NOT EXISTS portfolio_reviews (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id  INTEGER,           -- weak reference, no FK
    title       TEXT NOT NULL,
    description TEXT,
    image       TEXT,
    date        TEXT,
    created_at  TEXT NOT NULL,
    created_by  INTEGER,
    edited_at   TEXT,
    edited_by   INTEGER,
    deleted_at  TEXT,
    deleted_by  INTEGER
);

CREATE TABLE IF NOT EXISTS messages (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT NOT NULL,
    company       TEXT,
    address       TEXT,
    description   TEXT,
    product_id    INTEGER,
    date_schedule TEXT,
    phone         TEXT,
    created_at    TEXT NOT NULL,
    created_by    INTEGER,
    edited_at     TEXT,
    edited_by     INTEGER,
    deleted_at    TEXT,
    deleted_by    INTEGER
);

-- Tokens are stored as SHA-256 hex digests, never in the clear.
CREATE TABLE IF NOT EXISTS revoked_tokens (
    token_digest TEXT PRIMARY KEY,
    expires_at   INTEGER NOT NULL  -- unix seconds
);

CREATE INDEX IF NOT EXISTS idx_revoked_tokens_expiry
    ON revoked_tokens(expires_at);
";
