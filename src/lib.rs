/*!
# STEM Data Dashboard

A web dashboard for exploring academic outcome data in STEM courses, built in Rust.

## Overview

Administrators upload institutional Excel workbooks of student and class records;
the dashboard validates and anonymizes them, then serves aggregate views: headline
statistics, DWF rate tables, a browsable record table and categorical charts that
bucket course outcomes by grade, race/ethnicity or gender.

## Architecture

The application follows a client-server architecture:

### Frontend Layer
- **Technologies**: HTML, CSS, JavaScript (served as static pages)
- **Key Components**:
  - Login / registration / OTP / password reset forms
  - Dashboard statistics cards and DWF tables
  - Data table with record limit control
  - Visualization builder with cascading course/term dropdowns

### Backend Layer
- **Technologies**: Rust, axum
- **Core Components**:
  - Bucketizer - Buckets raw category codes into fixed, ordered counts
  - Chart Renderer - Draws bar, scatter and stacked bar PNGs with plotters
  - Dataset Store - Students, courses and class rows with aggregate queries
  - Upload Validator - Row-level validation of Excel workbooks
  - Auth - Argon2 password hashing, sessions, admin OTP and reset codes

### Data Persistence Layer
- Dataset snapshots with Gzip compression and bincode serialization
- User accounts in a JSON file
- CSV and XLSX export of the flattened class records

## Modules

- **models**: Students, courses, class rows and the flattened table record
- **chart**: Dimensions, the bucketizer and PNG chart rendering
- **dataset**: The uploaded dataset and its aggregate queries
- **upload**: Excel workbook ingestion and validation
- **saving**: Dataset persistence with compression
- **export**: CSV and XLSX export
- **login**: User authentication, sessions, OTP and password resets
- **mailer**: OTP and reset code email delivery
- **app**: Routing and middleware

## REST API Endpoints

- `GET /all-data?limit=N` - Flattened class records
- `GET /dashboard-data` - Headline statistics
- `POST /average-dwf-rates` - Five highest or lowest DWF courses
- `GET /course-semester-mapping` - Course to offered-terms mapping
- `POST /api/chart` - Render a chart PNG for selected courses
- `POST /upload` - Ingest an Excel workbook (admin)
- `GET /export?format=csv|xlsx` - Download the dataset (admin)
*/

// Re-export all modules so they appear in the documentation
pub mod chart;
pub mod dataset;
pub mod export;
pub mod models;
pub mod saving;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod login;
#[cfg(feature = "web")]
pub mod mailer;
#[cfg(feature = "web")]
pub mod upload;

/// Re-export the core types to make them easier to use
pub use chart::*;
pub use dataset::*;
pub use models::*;
