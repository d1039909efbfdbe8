/*!

This is the long-form manual for `tally_sheet` and `tallyaudit`.

## Input documents

The input is the tally document (개표상황표) published for one district of the 21st
presidential election, as a PDF file. Each page holds the examination/tally section
(심사·집계부) of one voting district (투표구) for one voting type. Files that are not PDF
documents are ignored.

For each candidate, a page lists:
* the classified ballots (분류된 투표지): ballots already sorted for the candidate
* the reconfirm ballots (재확인대상 투표지): ballots set aside for re-verification
* the total (계), which should be the sum of the two

and for the page: the valid votes, the invalid votes and the total.

## Voting types

The voting type of a page is decided by its position in the document:

| Pages   | Voting type              |
|---------|--------------------------|
| 1-26    | `관내사전 (Early In)`     |
| 27-168  | `선거일 (Election Day)`   |
| 169     | `관외사전 (Early Out)`    |
| 170     | `재외투표 (Overseas)`     |
| 171     | `거소/선상 (Absentee)`    |

Pages after 171 keep the voting type read from the page. Documents with another layout
need another table, which can be given in the configuration file:

```json
{
  "pageRanges": [
    {"first": 1, "last": 10, "label": "관내사전"},
    {"first": 11, "last": 40, "label": "선거일"}
  ]
}
```

## Extraction

Each page is rendered to an image and sent to a vision model, which returns the
district, the voting type, the candidate breakdown and the page totals as JSON. Numbers
that the model could not read are counted as 0. A page that cannot be extracted is
skipped with a warning; the run continues with the next page. There are no retries.

`--start` and `--end` restrict the processing to a window of pages (1-based, both
included), and `--sample N` processes N pages from the start page. The pages keep their
number in the document, so page 27 is always an election day page.

The totals read from the page are never corrected. Candidate entries where the total is
not the sum of the classified and reconfirm ballots are listed as discrepancies in the
summary.

## Outputs

* The CSV export (`21대대선_심사집계부_<N>명.csv`): one row per page, with the district,
  the voting type, the page totals and three columns per selected candidate, and a
  last row `전체 합계` with the totals of every column. The file starts with a byte
  order mark so that spreadsheet programs read it as UTF-8. An Excel copy with the same
  columns is written next to it (`.xlsx`).
* The summary (JSON): totals by district, by candidate and by voting type.
* The records (JSON): the raw extracted pages, which can be loaded again with
  `--records-in` to produce new exports without calling the model.

*/
