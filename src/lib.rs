/*!
# Task CSV Builder

A small web app for typing up a day's tasks in a grid and exporting them as a
CSV file for a task-management app, with a short-lived link (and QR code) so a
phone can fetch the same file.

## Overview

Rows are entered in a spreadsheet-style table or pasted in bulk, one task per
line. Blank cells are filled from a per-session defaults record, the Schedule
column is canonicalized to `HH:MM`, and rows without a task name are dropped on
export.

## Architecture

### Frontend Layer
- **Technologies**: HTML, CSS, vanilla JavaScript served from the binary
- **Key Components**:
  - Defaults panel - date, schedule, section, project, tag and estimate used for blank cells
  - Bulk entry - one row per line of text
  - Task grid - inline editing with dropdown suggestions
  - Share panel - link, remaining time and QR code

### Backend Layer
- **Technologies**: Rust, axum
- **Core Components**:
  - Schedule Normalizer - free-form time text to `HH:MM`
  - Row Defaulting Engine - fills blank cells, filters unnamed rows
  - CSV Writer - fixed header, `YYYY/MM/DD` dates, UTF-8 BOM or Shift_JIS
  - Payload Codec - CSV bytes plus expiry packed into a URL-safe token
  - Share Service - signed object-storage URL, payload link, or token link, in that order

### State
- Everything lives in memory for the life of the process
- Share tokens are reclaimed lazily when links are issued or followed

## Modules

- **schedule**: Schedule normalization
- **task**: Row types, column order and stock defaults
- **defaults**: Blank-cell resolution and export filtering
- **sheet**: The in-memory task table and bulk entry
- **options**: Dropdown suggestion lists and estimate choices
- **downloader**: CSV text and byte encoding
- **payload**: Self-contained expiring payload tokens
- **share**: Link issuers, the token store and public URL handling
- **config**: Environment-driven settings
- **app**: Routing and handlers (web feature)
- **qr**: QR rendering (web feature)

## REST API Endpoints

- `/` - Builder page; `?token=` / `?payload=` download a shared CSV
- `/api/sheet` - Table, defaults and suggestion lists
- `/api/rows` - Replace (`PUT`) or clear (`DELETE`) the table
- `/api/rows/bulk` - Append one row per text line
- `/api/defaults` - Set the defaults record
- `/api/preview` - Resolved rows as they will be exported
- `/api/export` - CSV download
- `/api/share` - Create a temporary download link
*/

pub mod clock;
pub mod config;
pub mod defaults;
pub mod downloader;
pub mod error;
pub mod options;
pub mod payload;
pub mod schedule;
pub mod share;
pub mod sheet;
pub mod task;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod qr;

pub use config::AppConfig;
pub use error::{CodecError, ConfigError, ShareError};
pub use sheet::TaskSheet;
pub use task::{Defaults, TaskInput, TaskRow};
